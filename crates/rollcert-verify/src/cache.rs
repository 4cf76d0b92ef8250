//! Shared per-tick snapshot cache
//!
//! All observation tasks of one verification run read cluster state
//! through a single cache: the first worker to poll on a logical tick
//! fetches a fresh snapshot, every other worker on the same tick gets
//! a read-only view of the same value. Workers polling from different
//! instants can therefore never disagree about what one tick showed.

use rollcert_cluster::{ClusterError, FleetSelector, FleetSnapshot, SnapshotFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Cached {
    taken: Instant,
    snapshot: Arc<FleetSnapshot>,
}

/// One shared snapshot per polling tick
///
/// A snapshot older than `max_age` (one poll interval) is never
/// served; the next reader fetches a replacement. Fetches are
/// serialized under the slot lock, so one tick costs one listing no
/// matter how many workers poll.
pub struct SnapshotCache {
    fetcher: SnapshotFetcher,
    selector: FleetSelector,
    max_age: Duration,
    slot: Mutex<Option<Cached>>,
}

impl SnapshotCache {
    /// Create a cache over the given fetcher and selector
    #[inline]
    #[must_use]
    pub fn new(fetcher: SnapshotFetcher, selector: FleetSelector, max_age: Duration) -> Self {
        Self {
            fetcher,
            selector,
            max_age,
            slot: Mutex::new(None),
        }
    }

    /// The snapshot for the current tick
    ///
    /// Serves the cached snapshot while it is younger than `max_age`,
    /// otherwise fetches a fresh one. A failed fetch is not cached.
    ///
    /// # Errors
    /// - `ClusterError` if a fresh fetch is needed and fails
    pub async fn current(&self) -> Result<Arc<FleetSnapshot>, ClusterError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.taken.elapsed() < self.max_age {
                return Ok(Arc::clone(&cached.snapshot));
            }
        }

        let snapshot = Arc::new(self.fetcher.fetch(&self.selector).await?);
        *slot = Some(Cached {
            taken: Instant::now(),
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("selector", &self.selector)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}
