//! Document store access
//!
//! The engines talk to the database only through [`DocumentClient`]. This
//! module holds that interface, the resource handles it returns, the query
//! model, and [`MemoryDocumentClient`], a full in-memory implementation.

mod client;
mod error;
mod handles;
pub mod links;
mod memory;
mod query;

pub use client::{etag, DocumentClient, ETAG_FIELD};
pub use error::{StoreError, StoreResult};
pub use handles::{CollectionSpec, Database, DocumentCollection, DEFAULT_THROUGHPUT, PARTITION_KEY_PATH};
pub use memory::{MemoryDocumentClient, Operation};
pub use query::{lookup, Comparison, DocumentQuery, Predicate, SortOrder, SqlParameter, SqlQuerySpec};
