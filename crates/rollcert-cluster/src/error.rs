//! Error types for the cluster model
//!
//! Provides error handling for:
//! - Transport failures while querying the state provider
//! - Malformed listings (duplicate member identities)

use crate::types::MemberId;

/// Transient failure while talking to the cluster state provider
///
/// Transport errors are never retried at this layer; retry is the
/// caller's responsibility through the wait driver.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cluster transport error: {message}")]
pub struct TransportError {
    /// Human-readable failure description
    pub message: String,
}

impl TransportError {
    /// Create a transport error with the given description
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors produced while fetching and assembling snapshots
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    /// The state provider could not be reached or returned garbage
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A listing reported the same member identity twice
    #[error("duplicate member in listing: {0}")]
    DuplicateMember(MemberId),
}

impl ClusterError {
    /// Check whether the error is transient and safe to retry
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
