//! Testing utilities for the Rollcert workspace
//!
//! Shared fixtures: a scripted in-memory cluster state provider that
//! plays back a sequence of fleet states one tick per listing call,
//! with transport-fault injection, plus raw member builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use rollcert_cluster::{ClusterStateProvider, FleetSelector, MemberId, RawMember, TransportError};

/// Fixed base time for fixture timestamps
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// `base_time()` shifted forward by whole seconds
pub fn at(seconds: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(seconds)
}

/// A ready member created at `created` carrying `version`
pub fn ready_member(
    name: &str,
    fleet: &str,
    created: DateTime<Utc>,
    version: &str,
) -> RawMember {
    RawMember {
        id: MemberId::new(name),
        fleet: fleet.to_string(),
        ready: true,
        deletion_timestamp: None,
        ready_since: Some(created),
        creation_timestamp: created,
        version_label: Some(version.to_string()),
    }
}

/// A member with a deletion timestamp set (terminating)
pub fn terminating_member(
    name: &str,
    fleet: &str,
    created: DateTime<Utc>,
    version: &str,
) -> RawMember {
    RawMember {
        id: MemberId::new(name),
        fleet: fleet.to_string(),
        ready: false,
        deletion_timestamp: Some(created + Duration::seconds(1)),
        ready_since: None,
        creation_timestamp: created,
        version_label: Some(version.to_string()),
    }
}

/// A member that is neither ready nor terminating (starting up)
pub fn starting_member(
    name: &str,
    fleet: &str,
    created: DateTime<Utc>,
    version: &str,
) -> RawMember {
    RawMember {
        id: MemberId::new(name),
        fleet: fleet.to_string(),
        ready: false,
        deletion_timestamp: None,
        ready_since: None,
        creation_timestamp: created,
        version_label: Some(version.to_string()),
    }
}

/// One scripted listing outcome
#[derive(Debug, Clone)]
pub enum Tick {
    /// The full (unfiltered) set of members present on this tick
    Members(Vec<RawMember>),
    /// A transport fault for this tick
    Fault(String),
}

struct Script {
    ticks: Vec<Tick>,
    cursor: usize,
    list_calls: usize,
}

/// Scripted cluster state provider
///
/// Each `list_members` call consumes the next tick; once the script is
/// exhausted the final tick repeats forever. Listings honor the
/// selector: only members whose fleet label matches `selector.fleet`
/// in the provider's namespace are returned, so selecting one fleet
/// never leaks members of another.
pub struct ScriptedCluster {
    namespace: String,
    script: Mutex<Script>,
}

impl ScriptedCluster {
    /// Create a provider in `namespace` playing back `ticks`
    pub fn new(namespace: impl Into<String>, ticks: Vec<Tick>) -> Self {
        assert!(!ticks.is_empty(), "script needs at least one tick");
        Self {
            namespace: namespace.into(),
            script: Mutex::new(Script {
                ticks,
                cursor: 0,
                list_calls: 0,
            }),
        }
    }

    /// How many listing calls the provider has served
    pub fn list_calls(&self) -> usize {
        self.script.lock().list_calls
    }

    fn next_tick(&self) -> Tick {
        let mut script = self.script.lock();
        script.list_calls += 1;
        let tick = script.ticks[script.cursor].clone();
        if script.cursor + 1 < script.ticks.len() {
            script.cursor += 1;
        }
        tick
    }
}

#[async_trait]
impl ClusterStateProvider for ScriptedCluster {
    async fn list_members(
        &self,
        selector: &FleetSelector,
    ) -> Result<Vec<RawMember>, TransportError> {
        match self.next_tick() {
            Tick::Fault(message) => Err(TransportError::new(message)),
            Tick::Members(members) => {
                if selector.namespace != self.namespace {
                    return Ok(vec![]);
                }
                Ok(members
                    .into_iter()
                    .filter(|m| m.fleet == selector.fleet)
                    .collect())
            }
        }
    }

    async fn get_member(
        &self,
        selector: &FleetSelector,
        id: &MemberId,
    ) -> Result<Option<RawMember>, TransportError> {
        let listing = self.list_members(selector).await?;
        Ok(listing.into_iter().find(|m| &m.id == id))
    }
}
