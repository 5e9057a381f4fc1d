//! Stored document shapes
//!
//! Three kinds of documents share the same partitioning scheme (by stream
//! id) and can share a collection, so every document carries a
//! `documentType` discriminator:
//!
//! | Kind      | id                      | documentType |
//! |-----------|-------------------------|--------------|
//! | event     | `jrnl-{stream}-{seq}`   | `jrnl`       |
//! | metadata  | `{stream}`              | `meta`       |
//! | snapshot  | `snap-{stream}-{seq}`   | `snap`       |
//!
//! All field names are camelCase. Stream ids inside documents are always
//! normalized.

mod journal_entry;
mod metadata_entry;
mod snapshot_entry;

pub use journal_entry::JournalEntry;
pub use metadata_entry::MetadataEntry;
pub use snapshot_entry::{timestamp_at_or_before, timestamp_equals, SnapshotEntry};

/// Document field names used in queries
pub mod fields {
    pub const ID: &str = "id";
    pub const STREAM_ID: &str = "streamId";
    pub const SEQUENCE_NR: &str = "sequenceNr";
    pub const DOCUMENT_TYPE: &str = "documentType";
    pub const TIMESTAMP_DATE: &str = "timestamp.date";
    pub const TIMESTAMP_TICKS: &str = "timestamp.ticks";
}
