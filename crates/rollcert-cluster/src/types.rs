//! Core types for the cluster model
//!
//! Defines the fundamental values the engine observes:
//! - Member identity
//! - Fleet selectors
//! - Raw replica records as reported by the state provider
//! - Classified members as captured into snapshots

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique member identifier within a fleet (the replica name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl MemberId {
    /// Create a member id from a replica name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The replica name as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Selects the members of one logical fleet
///
/// A fleet is identified by its scope (namespace) plus its fleet
/// identity label value. Providers must return only members carrying
/// the matching fleet label within the namespace; a bare server-name
/// label is not sufficient to scope a listing to one fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSelector {
    /// Namespace/scope in which the fleet runs
    pub namespace: String,
    /// Fleet identity label value (e.g. the domain uid)
    pub fleet: String,
}

impl FleetSelector {
    /// Create a new fleet selector
    #[inline]
    #[must_use]
    pub fn new(namespace: impl Into<String>, fleet: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            fleet: fleet.into(),
        }
    }
}

impl std::fmt::Display for FleetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.fleet)
    }
}

/// Raw replica record as reported by the cluster state provider
///
/// This is the wire-level view before classification. Readiness is a
/// plain signal; a set deletion timestamp means the replica is being
/// torn down regardless of what the readiness signal still says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMember {
    /// Replica name
    pub id: MemberId,
    /// Fleet identity label value
    pub fleet: String,
    /// Readiness signal
    pub ready: bool,
    /// Set when the replica is being deleted
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// When the readiness signal last became true, if known
    pub ready_since: Option<DateTime<Utc>>,
    /// When the replica was created
    pub creation_timestamp: DateTime<Utc>,
    /// Restart-version label, if present
    pub version_label: Option<String>,
}

/// A classified fleet member as captured into a snapshot
///
/// Immutable once captured; a new fetch produces new values rather
/// than mutating old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Replica name
    pub id: MemberId,
    /// Fleet identity label value
    pub fleet: String,
    /// Classified phase at capture time
    pub phase: Phase,
    /// When the member last became ready, if known
    pub ready_since: Option<DateTime<Utc>>,
    /// When the member was created
    pub creation_timestamp: DateTime<Utc>,
    /// Restart-version label, if present
    pub version_label: Option<String>,
}

impl Member {
    /// Build a member from a raw record and its classified phase
    #[inline]
    #[must_use]
    pub fn from_raw(raw: RawMember, phase: Phase) -> Self {
        Self {
            id: raw.id,
            fleet: raw.fleet,
            phase,
            ready_since: raw.ready_since,
            creation_timestamp: raw.creation_timestamp,
            version_label: raw.version_label,
        }
    }
}
