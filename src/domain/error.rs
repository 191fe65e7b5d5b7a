//! Domain error types for the category mapping engine.
//!
//! `StoreError` describes failures of the backing mapping store. The
//! classification path absorbs these; administrative operations surface them
//! wrapped in `MappingError`.

use thiserror::Error;

/// Failures reported by a `MappingStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Mapping store unavailable: {0}")]
    Unavailable(String),

    #[error("Mapping store timed out: {0}")]
    Timeout(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Mapping store operation failed: {0}")]
    OperationFailed(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

/// Errors surfaced by administrative mapping operations.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Mapping not found: {0}")]
    MappingNotFound(String),

    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition from {current} to {next}")]
    InvalidStatusTransition { current: String, next: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
