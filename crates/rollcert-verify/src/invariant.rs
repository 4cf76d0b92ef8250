//! Serialized-restart invariant checker
//!
//! The core safety predicate: at most one fleet member may be in the
//! Terminating phase at any observed instant. Evaluated fresh on every
//! snapshot; pure over its input and idempotent, so concurrent workers
//! reading the same snapshot always agree.

use chrono::{DateTime, Utc};
use rollcert_cluster::{FleetSnapshot, MemberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Evidence that the serialization guarantee was broken
///
/// Records which members were terminating simultaneously, the fetch
/// time of the offending snapshot, and when the violation was
/// detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("serialized-restart invariant violated: {} members terminating at once: {}",
    .terminating.len(), render_ids(.terminating))]
pub struct InvariantViolation {
    /// Members simultaneously in the Terminating phase
    pub terminating: BTreeSet<MemberId>,
    /// Fetch time of the offending snapshot
    pub snapshot_fetched_at: DateTime<Utc>,
    /// When the violation was detected
    pub detected_at: DateTime<Utc>,
}

fn render_ids(ids: &BTreeSet<MemberId>) -> String {
    ids.iter()
        .map(MemberId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check that at most one member of the snapshot is terminating
///
/// Returns the (possibly empty) set of terminating member ids, or an
/// `InvariantViolation` naming all offenders when two or more are
/// terminating at once.
///
/// # Errors
/// - `InvariantViolation` when the terminating count exceeds one
pub fn check_serialized(
    snapshot: &FleetSnapshot,
) -> Result<BTreeSet<MemberId>, InvariantViolation> {
    let terminating: BTreeSet<MemberId> = snapshot.terminating_ids().cloned().collect();
    if terminating.len() > 1 {
        tracing::error!(
            members = %render_ids(&terminating),
            "More than one member is terminating"
        );
        return Err(InvariantViolation {
            terminating,
            snapshot_fetched_at: snapshot.fetched_at(),
            detected_at: Utc::now(),
        });
    }
    Ok(terminating)
}
