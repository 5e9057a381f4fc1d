//! In-memory document store
//!
//! A complete `DocumentClient` that keeps everything in process memory. It
//! enforces the same rules a real partitioned store does (unique ids per
//! partition, partition key must match the document) and adds hooks for
//! tests: fault injection, artificial latency, creation counters and an
//! in-flight request high-water mark. Every write stamps a fresh `_etag`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::client::{etag, DocumentClient, ETAG_FIELD};
use super::error::{StoreError, StoreResult};
use super::handles::{CollectionSpec, Database, DocumentCollection};
use super::links::document_link;
use super::query::DocumentQuery;

/// Store call kinds, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    QueryDatabase,
    CreateDatabase,
    QueryCollection,
    CreateCollection,
    CreateDocument,
    UpsertDocument,
    ReplaceDocument,
    ReadDocument,
    DeleteDocument,
    QueryDocuments,
}

#[derive(Debug)]
struct Fault {
    operation: Operation,
    document_id: Option<String>,
    error: StoreError,
    /// `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug)]
struct CollectionState {
    handle: DocumentCollection,
    throughput: u32,
    partitions: HashMap<String, BTreeMap<String, Value>>,
}

#[derive(Debug)]
struct DatabaseState {
    handle: Database,
    collections: HashMap<String, CollectionState>,
}

#[derive(Debug, Default)]
struct Counters {
    database_creations: AtomicUsize,
    collection_creations: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    writes: AtomicU64,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Partitioned document store held in memory
#[derive(Debug, Default)]
pub struct MemoryDocumentClient {
    databases: RwLock<HashMap<String, DatabaseState>>,
    faults: Mutex<Vec<Fault>>,
    latency: Option<Duration>,
    counters: Counters,
}

impl MemoryDocumentClient {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it is served
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create a database and collection up front, without counting creations
    pub fn seed_collection(&self, database: &str, spec: CollectionSpec) -> DocumentCollection {
        let mut databases = self.databases.write();
        let db = databases
            .entry(database.to_string())
            .or_insert_with(|| DatabaseState {
                handle: Database::new(database),
                collections: HashMap::new(),
            });
        let handle = DocumentCollection::new(&db.handle, &spec);
        db.collections
            .entry(spec.id.clone())
            .or_insert_with(|| CollectionState {
                handle: handle.clone(),
                throughput: spec.throughput,
                partitions: HashMap::new(),
            })
            .handle
            .clone()
    }

    /// Fail every call of `operation` with `error` until cleared
    pub fn fail(&self, operation: Operation, error: StoreError) {
        self.push_fault(operation, None, error, None);
    }

    /// Fail the next `times` calls of `operation`
    pub fn fail_times(&self, operation: Operation, error: StoreError, times: usize) {
        if times == 0 {
            return;
        }
        self.push_fault(operation, None, error, Some(times));
    }

    /// Fail calls of `operation` that target the document `id`
    pub fn fail_document(&self, operation: Operation, id: impl Into<String>, error: StoreError) {
        self.push_fault(operation, Some(id.into()), error, None);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of databases created through the client
    pub fn database_creations(&self) -> usize {
        self.counters.database_creations.load(Ordering::SeqCst)
    }

    /// Number of collections created through the client
    pub fn collection_creations(&self) -> usize {
        self.counters.collection_creations.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were being served at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Handle of an existing collection
    pub fn collection(&self, database: &str, collection: &str) -> Option<DocumentCollection> {
        self.databases
            .read()
            .get(database)?
            .collections
            .get(collection)
            .map(|c| c.handle.clone())
    }

    /// Throughput a collection was created with
    pub fn collection_throughput(&self, database: &str, collection: &str) -> Option<u32> {
        self.databases
            .read()
            .get(database)?
            .collections
            .get(collection)
            .map(|c| c.throughput)
    }

    /// Documents of one partition, ordered by id
    pub fn documents(&self, database: &str, collection: &str, partition_key: &str) -> Vec<Value> {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .and_then(|c| c.partitions.get(partition_key))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total documents across all partitions of a collection
    pub fn document_count(&self, database: &str, collection: &str) -> usize {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .map(|c| c.partitions.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    fn push_fault(
        &self,
        operation: Operation,
        document_id: Option<String>,
        error: StoreError,
        remaining: Option<usize>,
    ) {
        self.faults.lock().push(Fault {
            operation,
            document_id,
            error,
            remaining,
        });
    }

    /// Account for a call, apply latency, then check injected faults
    async fn begin(&self, operation: Operation, document_id: Option<&str>) -> StoreResult<InFlight<'_>> {
        let current = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .peak_in_flight
            .fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.counters.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.faults.lock();
        let hit = faults.iter_mut().position(|fault| {
            fault.operation == operation
                && match (&fault.document_id, document_id) {
                    (Some(target), Some(id)) => target == id,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });
        if let Some(index) = hit {
            let error = faults[index].error.clone();
            if let Some(remaining) = faults[index].remaining.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    faults.remove(index);
                }
            }
            return Err(error);
        }

        Ok(guard)
    }

    /// Set a fresh version tag on a document about to be written
    fn stamp(&self, document: &mut Value) {
        let version = self.counters.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(fields) = document.as_object_mut() {
            fields.insert(ETAG_FIELD.to_string(), Value::String(format!("\"{:016x}\"", version)));
        }
    }

    /// Mutate one partition; partitions left empty are dropped
    fn write_partition<T>(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut databases = self.databases.write();
        let state = databases
            .get_mut(&collection.database_id)
            .and_then(|db| db.collections.get_mut(&collection.id))
            .ok_or_else(|| StoreError::NotFound(collection.self_link.clone()))?;
        let result = f(state.partitions.entry(partition_key.to_string()).or_default());
        if state.partitions.get(partition_key).is_some_and(BTreeMap::is_empty) {
            state.partitions.remove(partition_key);
        }
        result
    }

    /// Inspect one partition under the read lock; `None` if it holds nothing
    fn read_partition<T>(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        f: impl FnOnce(Option<&BTreeMap<String, Value>>) -> T,
    ) -> StoreResult<T> {
        let databases = self.databases.read();
        let state = databases
            .get(&collection.database_id)
            .and_then(|db| db.collections.get(&collection.id))
            .ok_or_else(|| StoreError::NotFound(collection.self_link.clone()))?;
        Ok(f(state.partitions.get(partition_key)))
    }

    /// Number of partitions holding at least one document
    pub fn partition_count(&self, database: &str, collection: &str) -> usize {
        self.databases
            .read()
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .map(|c| c.partitions.len())
            .unwrap_or(0)
    }
}

/// Check id and partition key of an incoming document, returning its id
fn validate_document(
    collection: &DocumentCollection,
    partition_key: &str,
    document: &Value,
) -> StoreResult<String> {
    let id = document
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::InvalidDocument("document has no string id".to_string()))?;

    let found = document
        .get(collection.partition_key_field())
        .and_then(Value::as_str)
        .unwrap_or_default();
    if found != partition_key {
        return Err(StoreError::PartitionKeyMismatch {
            expected: partition_key.to_string(),
            found: found.to_string(),
        });
    }

    Ok(id.to_string())
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

#[async_trait]
impl DocumentClient for MemoryDocumentClient {
    async fn query_database(&self, id: &str) -> StoreResult<Option<Database>> {
        let _call = self.begin(Operation::QueryDatabase, None).await?;
        Ok(self.databases.read().get(id).map(|db| db.handle.clone()))
    }

    async fn create_database(&self, id: &str) -> StoreResult<Database> {
        let _call = self.begin(Operation::CreateDatabase, None).await?;
        let mut databases = self.databases.write();
        if databases.contains_key(id) {
            return Err(StoreError::Conflict(format!("database {}", id)));
        }
        let handle = Database::new(id);
        databases.insert(
            id.to_string(),
            DatabaseState {
                handle: handle.clone(),
                collections: HashMap::new(),
            },
        );
        self.counters.database_creations.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn query_collection(
        &self,
        database: &Database,
        id: &str,
    ) -> StoreResult<Option<DocumentCollection>> {
        let _call = self.begin(Operation::QueryCollection, None).await?;
        let databases = self.databases.read();
        let db = databases
            .get(&database.id)
            .ok_or_else(|| StoreError::NotFound(database.self_link.clone()))?;
        Ok(db.collections.get(id).map(|c| c.handle.clone()))
    }

    async fn create_collection(
        &self,
        database: &Database,
        spec: &CollectionSpec,
    ) -> StoreResult<DocumentCollection> {
        let _call = self.begin(Operation::CreateCollection, None).await?;
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(&database.id)
            .ok_or_else(|| StoreError::NotFound(database.self_link.clone()))?;
        if db.collections.contains_key(&spec.id) {
            return Err(StoreError::Conflict(format!("collection {}", spec.id)));
        }
        let handle = DocumentCollection::new(&db.handle, spec);
        db.collections.insert(
            spec.id.clone(),
            CollectionState {
                handle: handle.clone(),
                throughput: spec.throughput,
                partitions: HashMap::new(),
            },
        );
        self.counters.collection_creations.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn create_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
    ) -> StoreResult<()> {
        let _call = self.begin(Operation::CreateDocument, document_id(&document)).await?;
        let id = validate_document(collection, partition_key, &document)?;
        let mut document = document;
        self.stamp(&mut document);
        self.write_partition(collection, partition_key, |partition| {
            if partition.contains_key(&id) {
                return Err(StoreError::Conflict(document_link(
                    &collection.database_id,
                    &collection.id,
                    &id,
                )));
            }
            partition.insert(id, document);
            Ok(())
        })
    }

    async fn upsert_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
    ) -> StoreResult<()> {
        let _call = self.begin(Operation::UpsertDocument, document_id(&document)).await?;
        let id = validate_document(collection, partition_key, &document)?;
        let mut document = document;
        self.stamp(&mut document);
        self.write_partition(collection, partition_key, |partition| {
            partition.insert(id, document);
            Ok(())
        })
    }

    async fn replace_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        document: Value,
        if_match: &str,
    ) -> StoreResult<()> {
        let _call = self.begin(Operation::ReplaceDocument, document_id(&document)).await?;
        let id = validate_document(collection, partition_key, &document)?;
        let link = document_link(&collection.database_id, &collection.id, &id);
        self.write_partition(collection, partition_key, |partition| {
            let current = partition
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(link.clone()))?;
            if etag(current) != Some(if_match) {
                return Err(StoreError::PreconditionFailed(link));
            }
            let mut document = document;
            self.stamp(&mut document);
            partition.insert(id, document);
            Ok(())
        })
    }

    async fn read_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        id: &str,
    ) -> StoreResult<Option<Value>> {
        let _call = self.begin(Operation::ReadDocument, Some(id)).await?;
        self.read_partition(collection, partition_key, |partition| {
            partition.and_then(|docs| docs.get(id)).cloned()
        })
    }

    async fn delete_document(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        id: &str,
    ) -> StoreResult<()> {
        let _call = self.begin(Operation::DeleteDocument, Some(id)).await?;
        self.write_partition(collection, partition_key, |partition| {
            partition
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| {
                    StoreError::NotFound(document_link(&collection.database_id, &collection.id, id))
                })
        })
    }

    async fn query_documents(
        &self,
        collection: &DocumentCollection,
        partition_key: &str,
        query: &DocumentQuery,
    ) -> StoreResult<Vec<Value>> {
        let _call = self.begin(Operation::QueryDocuments, None).await?;
        self.read_partition(collection, partition_key, |partition| match partition {
            Some(docs) => query.apply(docs.values().cloned()),
            None => Vec::new(),
        })
    }
}
