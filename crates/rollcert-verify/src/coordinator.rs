//! Concurrency coordinator
//!
//! Fans out one observation task per expected fleet member, bounded
//! exactly to the fleet cardinality, joins them all, and aggregates
//! the verdict. The coordinator never panics and, apart from
//! synchronous configuration validation, always returns a structured
//! report the caller can inspect for partial results.

use crate::cache::SnapshotCache;
use crate::error::VerifyError;
use crate::invariant::InvariantViolation;
use crate::observe::{MemberOutcome, ObservationState, ObservationTask, PreRestartIdentity};
use crate::retry::{wait_until, RetryPolicy};
use rollcert_cluster::{ClusterStateProvider, FleetSelector, MemberId, SnapshotFetcher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Overall verdict of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every member converged to a restarted, ready identity
    Success,
    /// At least one member failed to converge or an invariant broke
    Failure,
}

/// Per-member entry of the verification report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReport {
    /// The observed member
    pub id: MemberId,
    /// State the member's task had reached when the run ended
    pub final_state: ObservationState,
    /// Rendered error that ended the task, if any
    pub error: Option<String>,
}

/// Structured result of one verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Overall verdict
    pub verdict: Verdict,
    /// One entry per expected member, ordered by id
    pub per_member: Vec<MemberReport>,
    /// Every distinct invariant violation observed during the run
    pub invariant_violations: Vec<InvariantViolation>,
}

impl VerificationReport {
    /// Whether every member reached `Restarted`
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }

    /// Members whose tasks timed out
    pub fn timed_out_members(&self) -> impl Iterator<Item = &MemberId> {
        self.per_member
            .iter()
            .filter(|m| m.final_state == ObservationState::TimedOut)
            .map(|m| &m.id)
    }
}

/// Inputs for one verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Which fleet to observe
    pub selector: FleetSelector,
    /// How many members the fleet is expected to have
    pub expected_members: usize,
    /// Pre-restart identity per expected member
    pub pre_restart: BTreeMap<MemberId, PreRestartIdentity>,
    /// Version label every member must carry after the restart
    pub expected_version: String,
    /// Wait configuration shared by every task of the run
    pub policy: RetryPolicy,
    /// Optional overall deadline for the whole verify call
    pub deadline: Option<Duration>,
}

/// Observes a triggered rolling restart and certifies it
///
/// The verifier only reads cluster state; triggering the restart
/// (patching the resource version) is the caller's business and must
/// happen before `verify` is invoked.
pub struct Verifier {
    fetcher: SnapshotFetcher,
}

impl Verifier {
    /// Create a verifier over the given state provider
    #[inline]
    #[must_use]
    pub fn new(provider: Arc<dyn ClusterStateProvider>) -> Self {
        Self {
            fetcher: SnapshotFetcher::new(provider),
        }
    }

    /// Verify that an already-triggered restart rolls serially and
    /// that every member converges to its restarted identity
    ///
    /// Launches one observation task per expected member. Siblings are
    /// deliberately not cancelled when one task fails fast on an
    /// invariant violation: every task runs to completion so the
    /// report shows the full set of affected members.
    ///
    /// # Errors
    /// - `VerifyError::Configuration` for an invalid request, raised
    ///   before any concurrent work starts. All other failures are
    ///   folded into the returned report.
    pub async fn verify(&self, request: VerifyRequest) -> Result<VerificationReport, VerifyError> {
        validate(&request)?;

        tracing::info!(
            selector = %request.selector,
            members = request.expected_members,
            expected_version = %request.expected_version,
            "Verifying rolling restart"
        );

        let snapshots = Arc::new(SnapshotCache::new(
            self.fetcher.clone(),
            request.selector.clone(),
            request.policy.poll_interval,
        ));

        // An expected fleet that stays empty is its own failure mode,
        // distinct from members that never restart.
        if !self.fleet_resolves(&request, &snapshots).await? {
            tracing::error!(selector = %request.selector, "No members found for expected fleet");
            return Ok(fleet_empty_report(&request));
        }

        let mut tasks = JoinSet::new();
        for (id, baseline) in request.pre_restart.clone() {
            let task = ObservationTask::new(
                id,
                baseline,
                request.expected_version.clone(),
                Arc::clone(&snapshots),
                request.policy.clone(),
            );
            tasks.spawn(task.run());
        }

        let mut outcomes: BTreeMap<MemberId, MemberOutcome> = BTreeMap::new();
        let deadline_hit = {
            let collect = async {
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok(outcome) => {
                            tracing::debug!(member = %outcome.id, state = %outcome.state, "Task finished");
                            outcomes.insert(outcome.id.clone(), outcome);
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "Observation task aborted");
                        }
                    }
                }
            };
            match request.deadline {
                Some(limit) => tokio::time::timeout(limit, collect).await.is_err(),
                None => {
                    collect.await;
                    false
                }
            }
        };
        if deadline_hit {
            tracing::warn!(selector = %request.selector, "Overall deadline reached, aborting remaining tasks");
            tasks.abort_all();
        }
        drop(tasks);

        Ok(build_report(&request, outcomes, deadline_hit))
    }

    /// Preflight: wait until the selector matches at least one member,
    /// absorbing transient transport failures
    async fn fleet_resolves(
        &self,
        request: &VerifyRequest,
        snapshots: &Arc<SnapshotCache>,
    ) -> Result<bool, VerifyError> {
        let snapshots = Arc::clone(snapshots);
        let outcome = wait_until(&request.policy, move || {
            let snapshots = Arc::clone(&snapshots);
            async move {
                let snapshot = snapshots.current().await.map_err(VerifyError::from)?;
                Ok(!snapshot.is_empty())
            }
        })
        .await?;
        Ok(outcome.is_satisfied())
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier").finish_non_exhaustive()
    }
}

/// Synchronous request validation, before any concurrency
fn validate(request: &VerifyRequest) -> Result<(), VerifyError> {
    if request.expected_members == 0 {
        return Err(VerifyError::Configuration(
            "expected member count is zero".to_string(),
        ));
    }
    if request.selector.namespace.is_empty() || request.selector.fleet.is_empty() {
        return Err(VerifyError::Configuration(format!(
            "malformed selector: {}",
            request.selector
        )));
    }
    if request.pre_restart.len() != request.expected_members {
        return Err(VerifyError::Configuration(format!(
            "pre-restart identity table has {} entries, expected {}",
            request.pre_restart.len(),
            request.expected_members
        )));
    }
    if request.expected_version.is_empty() {
        return Err(VerifyError::Configuration(
            "expected post-restart version is empty".to_string(),
        ));
    }
    request.policy.validate()
}

fn fleet_empty_report(request: &VerifyRequest) -> VerificationReport {
    let error = VerifyError::FleetEmpty {
        selector: request.selector.clone(),
    }
    .to_string();
    let per_member = request
        .pre_restart
        .keys()
        .map(|id| MemberReport {
            id: id.clone(),
            final_state: ObservationState::Pending,
            error: Some(error.clone()),
        })
        .collect();
    VerificationReport {
        verdict: Verdict::Failure,
        per_member,
        invariant_violations: vec![],
    }
}

fn build_report(
    request: &VerifyRequest,
    mut outcomes: BTreeMap<MemberId, MemberOutcome>,
    deadline_hit: bool,
) -> VerificationReport {
    let mut per_member = Vec::with_capacity(request.pre_restart.len());
    let mut violations: Vec<InvariantViolation> = Vec::new();
    let mut all_restarted = true;

    for id in request.pre_restart.keys() {
        match outcomes.remove(id) {
            Some(outcome) => {
                if outcome.state != ObservationState::Restarted {
                    all_restarted = false;
                }
                if let Some(violation) = outcome.violation {
                    // one entry per distinct offending set
                    if !violations.iter().any(|v| v.terminating == violation.terminating) {
                        violations.push(violation);
                    }
                }
                per_member.push(MemberReport {
                    id: id.clone(),
                    final_state: outcome.state,
                    error: outcome.error.map(|e| e.to_string()),
                });
            }
            None => {
                all_restarted = false;
                let error = if deadline_hit {
                    "verification deadline reached before the task finished".to_string()
                } else {
                    "observation task produced no outcome".to_string()
                };
                per_member.push(MemberReport {
                    id: id.clone(),
                    final_state: ObservationState::Pending,
                    error: Some(error),
                });
            }
        }
    }

    let verdict = if all_restarted {
        Verdict::Success
    } else {
        Verdict::Failure
    };
    tracing::info!(
        selector = %request.selector,
        ?verdict,
        violations = violations.len(),
        "Verification run complete"
    );

    VerificationReport {
        verdict,
        per_member,
        invariant_violations: violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request() -> VerifyRequest {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let pre_restart: BTreeMap<MemberId, PreRestartIdentity> = [
            (
                MemberId::new("server-1"),
                PreRestartIdentity::new(t0, Some("v1".to_string())),
            ),
            (
                MemberId::new("server-2"),
                PreRestartIdentity::new(t0, Some("v1".to_string())),
            ),
        ]
        .into_iter()
        .collect();

        VerifyRequest {
            selector: FleetSelector::new("ns-1", "domain1"),
            expected_members: 2,
            pre_restart,
            expected_version: "v2".to_string(),
            policy: RetryPolicy::default(),
            deadline: None,
        }
    }

    #[test]
    fn validation_accepts_a_well_formed_request() {
        assert!(validate(&request()).is_ok());
    }

    #[test]
    fn validation_rejects_zero_members() {
        let mut req = request();
        req.expected_members = 0;
        req.pre_restart.clear();
        assert!(matches!(
            validate(&req),
            Err(VerifyError::Configuration(msg)) if msg.contains("zero")
        ));
    }

    #[test]
    fn validation_rejects_malformed_selector() {
        let mut req = request();
        req.selector.fleet.clear();
        assert!(matches!(
            validate(&req),
            Err(VerifyError::Configuration(msg)) if msg.contains("selector")
        ));
    }

    #[test]
    fn validation_rejects_mismatched_identity_table() {
        let mut req = request();
        req.expected_members = 3;
        assert!(matches!(
            validate(&req),
            Err(VerifyError::Configuration(msg)) if msg.contains("identity table")
        ));
    }

    #[test]
    fn validation_rejects_empty_expected_version() {
        let mut req = request();
        req.expected_version.clear();
        assert!(matches!(validate(&req), Err(VerifyError::Configuration(_))));
    }

    #[test]
    fn validation_rejects_zero_poll_interval() {
        let mut req = request();
        req.policy.poll_interval = Duration::ZERO;
        assert!(matches!(validate(&req), Err(VerifyError::Configuration(_))));
    }

    #[test]
    fn report_serializes_for_machine_consumption() {
        let report = fleet_empty_report(&request());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"], "Failure");
        assert_eq!(json["per_member"][0]["id"], "server-1");
        assert_eq!(json["per_member"][0]["final_state"], "Pending");
    }

    #[test]
    fn fleet_empty_report_marks_every_member_pending() {
        let report = fleet_empty_report(&request());
        assert_eq!(report.verdict, Verdict::Failure);
        assert_eq!(report.per_member.len(), 2);
        for entry in &report.per_member {
            assert_eq!(entry.final_state, ObservationState::Pending);
            assert!(entry.error.as_deref().unwrap().contains("no members"));
        }
    }
}
