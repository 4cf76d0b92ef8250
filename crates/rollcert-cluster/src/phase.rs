//! Phase classification
//!
//! Maps a raw replica record to a closed set of phases using the
//! readiness and deletion-timestamp signals. Pure and deterministic;
//! no I/O, no retries.

use crate::types::RawMember;
use serde::{Deserialize, Serialize};

/// Observable lifecycle phase of a fleet member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Readiness signal is true and no deletion is in progress
    Ready,
    /// A deletion timestamp is set, regardless of readiness
    Terminating,
    /// Neither ready nor terminating (starting up, missing data)
    Unknown,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "Ready",
            Self::Terminating => "Terminating",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Classify a raw replica record into its phase
///
/// Deterministic over its input: the same record always yields the
/// same phase. A set deletion timestamp wins over readiness.
#[inline]
#[must_use]
pub fn classify(raw: &RawMember) -> Phase {
    if raw.deletion_timestamp.is_some() {
        Phase::Terminating
    } else if raw.ready {
        Phase::Ready
    } else {
        Phase::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberId;
    use chrono::{TimeZone, Utc};

    fn raw(ready: bool, deleting: bool) -> RawMember {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        RawMember {
            id: MemberId::new("server-1"),
            fleet: "domain1".to_string(),
            ready,
            deletion_timestamp: deleting.then_some(t0),
            ready_since: ready.then_some(t0),
            creation_timestamp: t0,
            version_label: Some("v1".to_string()),
        }
    }

    #[test]
    fn ready_without_deletion_is_ready() {
        assert_eq!(classify(&raw(true, false)), Phase::Ready);
    }

    #[test]
    fn deletion_timestamp_wins_over_readiness() {
        assert_eq!(classify(&raw(true, true)), Phase::Terminating);
        assert_eq!(classify(&raw(false, true)), Phase::Terminating);
    }

    #[test]
    fn not_ready_not_deleting_is_unknown() {
        assert_eq!(classify(&raw(false, false)), Phase::Unknown);
    }

    #[test]
    fn classify_is_idempotent() {
        let record = raw(true, false);
        let first = classify(&record);
        for _ in 0..10 {
            assert_eq!(classify(&record), first);
        }
    }
}
