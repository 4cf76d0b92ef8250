//! Fleet snapshots
//!
//! An unordered set of classified members captured at one instant.
//! Snapshots are immutable values; a new fetch produces a new
//! snapshot, never a mutation of an old one.

use crate::error::ClusterError;
use crate::phase::Phase;
use crate::types::{Member, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time view of a fleet's members
///
/// Invariant: no two members share the same identity. Enforced at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    members: BTreeMap<MemberId, Member>,
    fetched_at: DateTime<Utc>,
}

impl FleetSnapshot {
    /// Assemble a snapshot from classified members
    ///
    /// # Errors
    /// - `ClusterError::DuplicateMember` if two members share an id
    pub fn new(
        members: impl IntoIterator<Item = Member>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, ClusterError> {
        let mut map = BTreeMap::new();
        for member in members {
            let id = member.id.clone();
            if map.insert(id.clone(), member).is_some() {
                return Err(ClusterError::DuplicateMember(id));
            }
        }
        Ok(Self {
            members: map,
            fetched_at,
        })
    }

    /// Look up a member by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    /// Iterate over all members
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Ids of all members in the snapshot
    pub fn member_ids(&self) -> impl Iterator<Item = &MemberId> {
        self.members.keys()
    }

    /// Ids of members currently in the Terminating phase
    pub fn terminating_ids(&self) -> impl Iterator<Item = &MemberId> {
        self.members
            .values()
            .filter(|m| m.phase == Phase::Terminating)
            .map(|m| &m.id)
    }

    /// Number of members captured
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the snapshot captured no members
    ///
    /// An empty snapshot is a valid value; whether it is an error for
    /// an expected fleet is decided at a higher layer.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// When this snapshot was fetched
    #[inline]
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member(name: &str, phase: Phase) -> Member {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Member {
            id: MemberId::new(name),
            fleet: "domain1".to_string(),
            phase,
            ready_since: None,
            creation_timestamp: t0,
            version_label: Some("v1".to_string()),
        }
    }

    #[test]
    fn snapshot_rejects_duplicate_identity() {
        let now = Utc::now();
        let result = FleetSnapshot::new(
            vec![member("server-1", Phase::Ready), member("server-1", Phase::Unknown)],
            now,
        );
        assert!(matches!(
            result,
            Err(ClusterError::DuplicateMember(id)) if id.as_str() == "server-1"
        ));
    }

    #[test]
    fn snapshot_lookup_and_len() {
        let now = Utc::now();
        let snap = FleetSnapshot::new(
            vec![member("server-1", Phase::Ready), member("server-2", Phase::Unknown)],
            now,
        )
        .unwrap();

        assert_eq!(snap.len(), 2);
        assert!(!snap.is_empty());
        assert_eq!(snap.fetched_at(), now);
        assert_eq!(
            snap.get(&MemberId::new("server-2")).unwrap().phase,
            Phase::Unknown
        );
        assert!(snap.get(&MemberId::new("server-3")).is_none());
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snap = FleetSnapshot::new(vec![], Utc::now()).unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.len(), 0);
    }

    #[test]
    fn terminating_ids_filters_by_phase() {
        let snap = FleetSnapshot::new(
            vec![
                member("server-1", Phase::Ready),
                member("server-2", Phase::Terminating),
                member("server-3", Phase::Terminating),
            ],
            Utc::now(),
        )
        .unwrap();

        let ids: Vec<_> = snap.terminating_ids().map(MemberId::as_str).collect();
        assert_eq!(ids, vec!["server-2", "server-3"]);
    }
}
