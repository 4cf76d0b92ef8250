//! Cluster state provider and snapshot fetcher
//!
//! The provider trait is the engine's only window onto the cluster:
//! point-in-time listings filtered by a fleet selector, plus single
//! member lookups. Providers are read-only collaborators; they must
//! never mutate cluster state.

use crate::error::{ClusterError, TransportError};
use crate::phase::classify;
use crate::snapshot::FleetSnapshot;
use crate::types::{FleetSelector, Member, MemberId, RawMember};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Read-only access to cluster state
///
/// Implementations must scope `list_members` to the selector's fleet
/// within its namespace; returning members of other fleets that merely
/// share a server-name label is a contract violation.
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    /// List the current members matching the selector
    ///
    /// # Errors
    /// - `TransportError` if the cluster API is unreachable or the
    ///   response is malformed
    async fn list_members(
        &self,
        selector: &FleetSelector,
    ) -> Result<Vec<RawMember>, TransportError>;

    /// Look up a single member, `None` if it does not exist
    ///
    /// # Errors
    /// - `TransportError` on API/network failure
    async fn get_member(
        &self,
        selector: &FleetSelector,
        id: &MemberId,
    ) -> Result<Option<RawMember>, TransportError>;
}

/// Fetches immutable fleet snapshots through a state provider
///
/// No internal retry: a failed fetch surfaces as an error and the
/// caller decides whether to poll again.
#[derive(Clone)]
pub struct SnapshotFetcher {
    provider: Arc<dyn ClusterStateProvider>,
}

impl SnapshotFetcher {
    /// Create a fetcher over the given provider
    #[inline]
    #[must_use]
    pub fn new(provider: Arc<dyn ClusterStateProvider>) -> Self {
        Self { provider }
    }

    /// Capture the current members of the selected fleet
    ///
    /// An empty result is a valid snapshot, not an error.
    ///
    /// # Errors
    /// - `ClusterError::Transport` on provider failure
    /// - `ClusterError::DuplicateMember` if the listing is malformed
    pub async fn fetch(&self, selector: &FleetSelector) -> Result<FleetSnapshot, ClusterError> {
        let raws = self.provider.list_members(selector).await?;
        let fetched_at = Utc::now();

        let members: Vec<Member> = raws
            .into_iter()
            .map(|raw| {
                let phase = classify(&raw);
                Member::from_raw(raw, phase)
            })
            .collect();

        let snapshot = FleetSnapshot::new(members, fetched_at)?;
        tracing::debug!(
            selector = %selector,
            members = snapshot.len(),
            "Fetched fleet snapshot"
        );
        Ok(snapshot)
    }
}

impl std::fmt::Debug for SnapshotFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotFetcher").finish_non_exhaustive()
    }
}
