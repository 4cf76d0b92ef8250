//! Rollcert Cluster - read-only fleet state model
//!
//! The cluster-facing half of the verification engine:
//! - Member identity and fleet selector types
//! - Phase classification from raw replica records
//! - Point-in-time fleet snapshots
//! - The cluster state provider abstraction and snapshot fetcher
//!
//! Nothing in this crate mutates cluster state; providers are queried,
//! records are classified, snapshots are captured and never modified.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod phase;
pub mod provider;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use error::{ClusterError, TransportError};
pub use phase::{classify, Phase};
pub use provider::{ClusterStateProvider, SnapshotFetcher};
pub use snapshot::FleetSnapshot;
pub use types::{FleetSelector, Member, MemberId, RawMember};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
