//! Per-member observation task
//!
//! A state machine that watches one fleet member through a triggered
//! restart:
//!
//! ```text
//! Waiting -> TerminationObserved -> ReadinessPending -> Restarted
//!                 |                        |
//!                 +-- InvariantViolated    +-- TimedOut
//! ```
//!
//! Termination only needs to be witnessed once; the member is not
//! required to stay terminating across ticks. Restart is confirmed
//! only when readiness, a refreshed creation timestamp, and the
//! expected version label all hold in a single snapshot read.

use crate::cache::SnapshotCache;
use crate::error::VerifyError;
use crate::invariant::{check_serialized, InvariantViolation};
use crate::retry::{wait_until, RetryPolicy, WaitOutcome};
use chrono::{DateTime, Utc};
use rollcert_cluster::{Member, MemberId, Phase};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// States of the per-member observation state machine
///
/// `Pending` is the verdict of a task that never produced one (not
/// started, or cut off by the overall deadline). Terminal states are
/// sticky; a task that reaches one stops polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationState {
    /// No verdict yet
    Pending,
    /// Polling for the member's termination to be witnessed
    Waiting,
    /// Termination was witnessed once
    TerminationObserved,
    /// Polling for readiness with refreshed identity
    ReadinessPending,
    /// The member converged to a ready, restarted identity
    Restarted,
    /// A wait exceeded its deadline
    TimedOut,
    /// The serialized-restart invariant was violated
    InvariantViolated,
}

impl ObservationState {
    /// Whether this state ends the task
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Restarted | Self::TimedOut | Self::InvariantViolated
        )
    }
}

impl std::fmt::Display for ObservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Waiting => "Waiting",
            Self::TerminationObserved => "TerminationObserved",
            Self::ReadinessPending => "ReadinessPending",
            Self::Restarted => "Restarted",
            Self::TimedOut => "TimedOut",
            Self::InvariantViolated => "InvariantViolated",
        };
        write!(f, "{s}")
    }
}

/// A member's identity captured before the restart was triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreRestartIdentity {
    /// Creation timestamp before the restart
    pub creation_timestamp: DateTime<Utc>,
    /// Version label before the restart, if any
    pub version_label: Option<String>,
}

impl PreRestartIdentity {
    /// Capture a pre-restart identity
    #[inline]
    #[must_use]
    pub fn new(creation_timestamp: DateTime<Utc>, version_label: Option<String>) -> Self {
        Self {
            creation_timestamp,
            version_label,
        }
    }
}

/// Final result of observing one member
#[derive(Debug, Clone)]
pub struct MemberOutcome {
    /// The observed member
    pub id: MemberId,
    /// State the task had reached when it ended
    pub state: ObservationState,
    /// Violation evidence, when the task failed fast on the invariant
    pub violation: Option<InvariantViolation>,
    /// The error that ended the task, if any
    pub error: Option<VerifyError>,
}

/// Whether a single snapshot read shows the member fully restarted
///
/// All three conditions must hold together in one read; accumulating
/// them across reads would accept a stale partial update.
#[inline]
#[must_use]
pub fn member_restarted(
    member: &Member,
    baseline: &PreRestartIdentity,
    expected_version: &str,
) -> bool {
    member.phase == Phase::Ready
        && member.creation_timestamp > baseline.creation_timestamp
        && member.version_label.as_deref() == Some(expected_version)
}

/// Watches one member through the restart
///
/// Owned exclusively by the coordinator for one verification run;
/// mutated only by its own polling loop.
pub struct ObservationTask {
    member: MemberId,
    baseline: PreRestartIdentity,
    expected_version: String,
    snapshots: Arc<SnapshotCache>,
    policy: RetryPolicy,
    state: ObservationState,
}

impl ObservationTask {
    /// Create a task for one member
    #[inline]
    #[must_use]
    pub fn new(
        member: MemberId,
        baseline: PreRestartIdentity,
        expected_version: String,
        snapshots: Arc<SnapshotCache>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            member,
            baseline,
            expected_version,
            snapshots,
            policy,
            state: ObservationState::Waiting,
        }
    }

    /// Drive the state machine to a terminal state
    pub async fn run(mut self) -> MemberOutcome {
        tracing::info!(member = %self.member, "Waiting for member to begin terminating");

        match self.await_termination().await {
            Ok(WaitOutcome::Satisfied) => {
                self.transition(ObservationState::TerminationObserved);
            }
            Ok(WaitOutcome::TimedOut) => {
                tracing::warn!(member = %self.member, stage = %self.state, "Timed out waiting for termination");
                let stage = self.state;
                return self.finish(
                    ObservationState::TimedOut,
                    None,
                    Some(VerifyError::Timeout {
                        waited: self.policy.timeout,
                        stage,
                    }),
                );
            }
            Err(VerifyError::Invariant(violation)) => {
                tracing::error!(member = %self.member, %violation, "Invariant violated");
                return self.finish(
                    ObservationState::InvariantViolated,
                    Some(violation.clone()),
                    Some(VerifyError::Invariant(violation)),
                );
            }
            Err(err) => {
                tracing::error!(member = %self.member, error = %err, "Termination wait failed");
                let stage = self.state;
                return self.finish(stage, None, Some(err));
            }
        }

        // Witnessing termination once is enough; move straight on to
        // polling for restarted readiness.
        self.transition(ObservationState::ReadinessPending);
        tracing::info!(member = %self.member, "Waiting for member to be ready with refreshed identity");

        match self.await_restarted().await {
            Ok(WaitOutcome::Satisfied) => {
                self.transition(ObservationState::Restarted);
                tracing::info!(member = %self.member, "Member restarted and converged");
                self.finish(ObservationState::Restarted, None, None)
            }
            Ok(WaitOutcome::TimedOut) => {
                tracing::warn!(member = %self.member, stage = %self.state, "Timed out waiting for restarted readiness");
                let stage = self.state;
                self.finish(
                    ObservationState::TimedOut,
                    None,
                    Some(VerifyError::Timeout {
                        waited: self.policy.timeout,
                        stage,
                    }),
                )
            }
            Err(err) => {
                tracing::error!(member = %self.member, error = %err, "Readiness wait failed");
                let stage = self.state;
                self.finish(stage, None, Some(err))
            }
        }
    }

    fn transition(&mut self, next: ObservationState) {
        tracing::debug!(member = %self.member, from = %self.state, to = %next, "Observation state change");
        self.state = next;
    }

    /// Waiting phase: poll until this member is witnessed terminating
    ///
    /// Every fresh snapshot first passes the global serialized-restart
    /// check; a violation aborts the wait immediately.
    async fn await_termination(&self) -> Result<WaitOutcome, VerifyError> {
        let member = self.member.clone();
        let snapshots = Arc::clone(&self.snapshots);

        wait_until(&self.policy, move || {
            let member = member.clone();
            let snapshots = Arc::clone(&snapshots);
            async move {
                let snapshot = snapshots.current().await.map_err(VerifyError::from)?;
                let terminating =
                    check_serialized(&snapshot).map_err(VerifyError::Invariant)?;
                Ok(terminating.contains(&member))
            }
        })
        .await
    }

    /// ReadinessPending phase: poll until one snapshot read shows the
    /// member ready with refreshed identity
    async fn await_restarted(&self) -> Result<WaitOutcome, VerifyError> {
        let member = self.member.clone();
        let baseline = self.baseline.clone();
        let expected_version = self.expected_version.clone();
        let snapshots = Arc::clone(&self.snapshots);

        wait_until(&self.policy, move || {
            let member = member.clone();
            let baseline = baseline.clone();
            let expected_version = expected_version.clone();
            let snapshots = Arc::clone(&snapshots);
            async move {
                let snapshot = snapshots.current().await.map_err(VerifyError::from)?;
                Ok(snapshot
                    .get(&member)
                    .is_some_and(|m| member_restarted(m, &baseline, &expected_version)))
            }
        })
        .await
    }

    fn finish(
        &self,
        state: ObservationState,
        violation: Option<InvariantViolation>,
        error: Option<VerifyError>,
    ) -> MemberOutcome {
        MemberOutcome {
            id: self.member.clone(),
            state,
            violation,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn classified(
        phase: Phase,
        created: DateTime<Utc>,
        version: Option<&str>,
    ) -> Member {
        Member {
            id: MemberId::new("server-1"),
            fleet: "domain1".to_string(),
            phase,
            ready_since: None,
            creation_timestamp: created,
            version_label: version.map(str::to_string),
        }
    }

    #[test]
    fn restart_requires_all_three_conditions_in_one_read() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap();
        let baseline = PreRestartIdentity::new(t0, Some("v1".to_string()));

        // fully restarted
        assert!(member_restarted(
            &classified(Phase::Ready, t1, Some("v2")),
            &baseline,
            "v2"
        ));

        // ready with new timestamp, stale version label
        assert!(!member_restarted(
            &classified(Phase::Ready, t1, Some("v1")),
            &baseline,
            "v2"
        ));

        // ready with updated label but old creation timestamp
        assert!(!member_restarted(
            &classified(Phase::Ready, t0, Some("v2")),
            &baseline,
            "v2"
        ));

        // refreshed identity but not ready yet
        assert!(!member_restarted(
            &classified(Phase::Unknown, t1, Some("v2")),
            &baseline,
            "v2"
        ));

        // missing version label
        assert!(!member_restarted(
            &classified(Phase::Ready, t1, None),
            &baseline,
            "v2"
        ));
    }

    #[test]
    fn creation_timestamp_must_be_strictly_newer() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let baseline = PreRestartIdentity::new(t0, Some("v1".to_string()));

        assert!(!member_restarted(
            &classified(Phase::Ready, t0, Some("v2")),
            &baseline,
            "v2"
        ));
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(ObservationState::Restarted.is_terminal());
        assert!(ObservationState::TimedOut.is_terminal());
        assert!(ObservationState::InvariantViolated.is_terminal());
        assert!(!ObservationState::Pending.is_terminal());
        assert!(!ObservationState::Waiting.is_terminal());
        assert!(!ObservationState::ReadinessPending.is_terminal());
    }
}
