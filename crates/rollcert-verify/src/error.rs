//! Error types for the verification engine
//!
//! Provides the failure taxonomy of a verification run:
//! - Transient transport failures (absorbed by the wait driver)
//! - Wait timeouts (surfaced per member)
//! - Serialized-restart invariant violations (fail-fast, most severe)
//! - Fleet-empty and configuration errors (never retried)

use crate::invariant::InvariantViolation;
use crate::observe::ObservationState;
use rollcert_cluster::{ClusterError, FleetSelector, TransportError};
use std::time::Duration;

/// Main verification error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifyError {
    /// Cluster API unreachable or returned a malformed response
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A wait exceeded its deadline
    #[error("wait timed out after {waited:?} in state {stage}")]
    Timeout {
        /// How long the wait ran before giving up
        waited: Duration,
        /// The observation state the task was in when it gave up
        stage: ObservationState,
    },

    /// More than one member was terminating at once
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// An expected fleet matched no members
    #[error("fleet {selector} has no members")]
    FleetEmpty {
        /// The selector that matched nothing
        selector: FleetSelector,
    },

    /// Invalid verification request, raised before any concurrent work
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl VerifyError {
    /// Check whether the error is transient and safe to retry
    ///
    /// Only transport failures qualify; everything else aborts the
    /// wait that observed it.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<ClusterError> for VerifyError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::Transport(transport) => Self::Transport(transport),
            // A listing with duplicate identities is a malformed
            // response, treated like any other transport fault.
            ClusterError::DuplicateMember(id) => {
                Self::Transport(TransportError::new(format!("duplicate member {id} in listing")))
            }
        }
    }
}
