//! Document store client interface

use async_trait::async_trait;
use serde_json::Value;

use super::error::StoreResult;
use super::handles::{CollectionSpec, Database, DocumentCollection};
use super::query::DocumentQuery;

/// System property holding a document's version tag
///
/// The store sets it on every write; it is echoed back on reads and queries
/// and used as the `if_match` argument of [`DocumentClient::replace_document`].
pub const ETAG_FIELD: &str = "_etag";

/// Version tag of a document read from the store
pub fn etag(document: &Value) -> Option<&str> {
    document.get(ETAG_FIELD).and_then(Value::as_str)
}

/// Asynchronous access to a partitioned document database
///
/// Every document call is scoped to one partition. Implementations must be
/// safe to share between tasks.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Look up a database by id
    async fn query_database(&self, id: &str) -> StoreResult<Option<Database>>;

    /// Create a database; `Conflict` if it exists
    async fn create_database(&self, id: &str) -> StoreResult<Database>;

    /// Look up a collection by id
    async fn query_collection(
        &self,
        database: &Database,
        id: &str,
    ) -> StoreResult<Option<DocumentCollection>>;

    /// Create a collection; `Conflict` if it exists
    async fn create_collection(
        &self,
        database: &Database,
        spec: &CollectionSpec,
    ) -> StoreResult<DocumentCollection>;

    /// Insert a new document; `Conflict` if the id is taken in the partition
    async fn create_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
    ) -> StoreResult<()>;

    /// Insert or replace a document by id
    async fn upsert_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
    ) -> StoreResult<()>;

    /// Replace an existing document only if its version tag is `if_match`
    ///
    /// `NotFound` if absent, `PreconditionFailed` if it was written since.
    async fn replace_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
        if_match: &str,
    ) -> StoreResult<()>;

    /// Point read by id; `None` if absent
    async fn read_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        id: &str,
    ) -> StoreResult<Option<Value>>;

    /// Delete by id; `NotFound` if absent
    async fn delete_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        id: &str,
    ) -> StoreResult<()>;

    /// Run a query within one partition
    async fn query_documents(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        query: &DocumentQuery,
    ) -> StoreResult<Vec<Value>>;
}
