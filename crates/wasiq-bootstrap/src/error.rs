//! Bootstrap error types

use thiserror::Error;
use wasiq_core::types::Discrepancy;

/// Result type for bootstrap operations
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Errors surfaced by the bootstrap verification protocol.
///
/// Transient reachability failures never appear here; they stay inside
/// the convergence loop as `VerifyOutcome::Offline` and are retried.
/// Every variant of this enum aborts node startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("{peer} returned a malformed snapshot: {reason}")]
    MalformedResponse { peer: String, reason: String },

    #[error("{peer} has incorrect configuration: {discrepancy}")]
    ConfigMismatch {
        peer: String,
        discrepancy: Discrepancy,
    },

    #[error("Bootstrap verification cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(String),
}
