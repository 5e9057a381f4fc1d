//! Crate error type

use thiserror::Error;

use crate::serialization::CodecError;
use crate::store::StoreError;
use crate::utils::TimestampError;

/// Result type for journal and snapshot store operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors surfaced to the host by the engines
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Missing resource with auto-initialization off, or invalid settings
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("document store error: {0}")]
    Store(#[from] StoreError),

    #[error("payload codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("timestamp error: {0}")]
    Timestamp(#[from] TimestampError),

    /// A stored document could not be read as the expected shape
    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),

    /// The event document already exists
    #[error("event {sequence_nr} of stream {stream_id:?} is already persisted")]
    DuplicateEvent { stream_id: String, sequence_nr: u64 },

    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// Some documents of a bulk delete could not be removed
    #[error("{failed} of {total} deletes failed: {source}")]
    DeleteFailed {
        failed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}

impl PersistenceError {
    /// True for an append that collided with an existing event
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PersistenceError::DuplicateEvent { .. })
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PersistenceError::Store(e) | PersistenceError::DeleteFailed { source: e, .. } => {
                matches!(e, StoreError::Throttled { .. } | StoreError::Unavailable(_))
            }
            _ => false,
        }
    }
}
