//! Document store errors

use thiserror::Error;

/// Result type for document store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Faults reported by a [`DocumentClient`](super::DocumentClient)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource already exists: {0}")]
    Conflict(String),
    #[error("document changed since it was read: {0}")]
    PreconditionFailed(String),
    #[error("partition key mismatch: request used {expected:?}, document holds {found:?}")]
    PartitionKeyMismatch { expected: String, found: String },
    #[error("request rate too large, retry after {retry_after_ms} ms")]
    Throttled { retry_after_ms: u64 },
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StoreError::PreconditionFailed(_))
    }
}
