//! Rollcert Verify - rolling-restart verification engine
//!
//! Observes a fleet of clustered server replicas while an orchestrator
//! performs a triggered restart and certifies two properties:
//! - the restart is serialized (at most one member down at any
//!   observed instant)
//! - every member converges to a ready state with refreshed identity
//!   (new creation timestamp, expected post-restart version label)
//!
//! The engine only observes; triggering the restart and mutating
//! cluster state are the caller's concerns.
//!
//! # Example
//!
//! ```rust,ignore
//! use rollcert_verify::{RetryPolicy, Verifier, VerifyRequest};
//!
//! # async fn example(provider: std::sync::Arc<dyn rollcert_cluster::ClusterStateProvider>,
//! #                  request: VerifyRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = Verifier::new(provider);
//! let report = verifier.verify(request).await?;
//!
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod invariant;
pub mod observe;
pub mod retry;

// Re-exports for convenience
pub use cache::SnapshotCache;
pub use coordinator::{MemberReport, Verdict, VerificationReport, Verifier, VerifyRequest};
pub use error::VerifyError;
pub use invariant::{check_serialized, InvariantViolation};
pub use observe::{
    member_restarted, MemberOutcome, ObservationState, ObservationTask, PreRestartIdentity,
};
pub use retry::{wait_until, RetryPolicy, WaitOutcome};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the verification engine
    pub use crate::{
        ObservationState, PreRestartIdentity, RetryPolicy, Verdict, VerificationReport, Verifier,
        VerifyError, VerifyRequest,
    };
    pub use rollcert_cluster::{FleetSelector, MemberId, Phase};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
