//! Integration tests for provisioning, settings and write-path faults
//!
//! These drive the public API against the in-memory document store.

use std::sync::Arc;
use std::time::Duration;

use cosmosdb_persistence::store::{CollectionSpec, Operation, SqlQuerySpec};
use cosmosdb_persistence::{
    AtomicWrite, Journal, JournalSettings, JsonSerializer, MemoryDocumentClient, PersistenceError,
    PersistenceSettings, PersistentRepr, SerializerRegistry, SnapshotMetadata,
    SnapshotSelectionCriteria, SnapshotSettings, SnapshotStore, StoreError, StoreSettings,
};

fn test_registry() -> Arc<SerializerRegistry> {
    Arc::new(
        SerializerRegistry::with_json(JsonSerializer::new().register::<String>("text")).unwrap(),
    )
}

fn text_write(stream: &str, seq: u64) -> AtomicWrite {
    AtomicWrite::single(PersistentRepr::from_value(stream, seq, format!("event {}", seq))).unwrap()
}

// ==================== Provisioning ====================

#[tokio::test]
async fn test_missing_database_is_a_configuration_error() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = Journal::new(client.clone(), test_registry(), JournalSettings::default()).unwrap();

    let err = journal.write_messages(vec![text_write("s", 1)]).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Configuration(_)));

    let err = Journal::start(client.clone(), test_registry(), JournalSettings::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, PersistenceError::Configuration(_)));
    assert_eq!(client.database_creations(), 0);
}

#[tokio::test]
async fn test_missing_collection_is_a_configuration_error() {
    let client = Arc::new(MemoryDocumentClient::new());
    client.seed_collection("Actors", CollectionSpec::partitioned_by_stream("other", 400));

    let store = SnapshotStore::new(client.clone(), test_registry(), SnapshotSettings::default()).unwrap();
    let err = store
        .load("s", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap_err();

    assert!(matches!(err, PersistenceError::Configuration(_)));
    assert_eq!(client.collection_creations(), 0);
}

#[tokio::test]
async fn test_concurrent_first_use_creates_resources_once() {
    let client = Arc::new(MemoryDocumentClient::new().with_latency(Duration::from_millis(3)));
    let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
    let journal = Journal::new(client.clone(), test_registry(), settings).unwrap();

    let (a, b, c) = tokio::join!(
        journal.write_messages(vec![text_write("a", 1)]),
        journal.write_messages(vec![text_write("b", 1)]),
        journal.read_highest_sequence_nr("c", 0),
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(c, 0);

    // journal and metadata share the default collection
    assert_eq!(client.database_creations(), 1);
    assert_eq!(client.collection_creations(), 1);
    assert_eq!(client.collection_throughput("Actors", "persistence"), Some(10100));
}

#[tokio::test]
async fn test_engines_share_existing_resources() {
    let client = Arc::new(MemoryDocumentClient::new());
    let auto = StoreSettings::new().with_auto_initialize(true);

    let journal = Journal::start(client.clone(), test_registry(), JournalSettings::new(auto.clone()))
        .await
        .unwrap();
    let snapshots = SnapshotStore::start(
        client.clone(),
        test_registry(),
        SnapshotSettings::new(auto.with_collection("snapshots")),
    )
    .await
    .unwrap();

    assert_eq!(client.database_creations(), 1);
    assert_eq!(client.collection_creations(), 2);

    journal.write_messages(vec![text_write("s", 1)]).await.unwrap();
    snapshots
        .save(&SnapshotMetadata::now("s", 1), Arc::new("state".to_string()))
        .await
        .unwrap();
    assert_eq!(client.document_count("Actors", "snapshots"), 1);
}

// ==================== Write path faults ====================

#[tokio::test]
async fn test_duplicate_append_is_distinct() {
    let client = Arc::new(MemoryDocumentClient::new());
    let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
    let journal = Journal::new(client.clone(), test_registry(), settings).unwrap();

    journal.write_messages(vec![text_write("s", 1)]).await.unwrap();
    let results = journal.write_messages(vec![text_write("s", 1)]).await.unwrap();

    match &results[0] {
        Err(PersistenceError::DuplicateEvent { stream_id, sequence_nr }) => {
            assert_eq!(stream_id, "s");
            assert_eq!(*sequence_nr, 1);
        }
        other => panic!("expected duplicate event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_writers_never_lower_the_mark() {
    let client = Arc::new(MemoryDocumentClient::new().with_latency(Duration::from_millis(2)));
    let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
    let journal = Journal::start(client.clone(), test_registry(), settings).await.unwrap();

    // one single-event batch per sequence number, highest first
    let batches = (1..=12).rev().map(|n| journal.write_messages(vec![text_write("s", n)]));
    for outcome in futures::future::join_all(batches).await {
        assert!(outcome.unwrap().iter().all(Result::is_ok));
    }

    assert_eq!(journal.read_highest_sequence_nr("s", 0).await, 12);
}

#[tokio::test]
async fn test_transient_fault_is_surfaced_unwrapped() {
    let client = Arc::new(MemoryDocumentClient::new());
    let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
    let journal = Journal::start(client.clone(), test_registry(), settings).await.unwrap();
    client.fail_document(
        Operation::CreateDocument,
        "jrnl-s-1",
        StoreError::Throttled { retry_after_ms: 50 },
    );

    let results = journal.write_messages(vec![text_write("s", 1)]).await.unwrap();
    let err = results[0].as_ref().unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::Store(StoreError::Throttled { retry_after_ms: 50 })
    ));
    assert!(err.is_transient());

    // the host retries; nothing was stored the first time
    client.clear_faults();
    let results = journal.write_messages(vec![text_write("s", 1)]).await.unwrap();
    assert!(results[0].is_ok());
}

#[tokio::test]
async fn test_delete_failure_is_aggregated() {
    let client = Arc::new(MemoryDocumentClient::new());
    let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
    let journal = Journal::new(client.clone(), test_registry(), settings).unwrap();
    journal
        .write_messages((1..=4).map(|n| text_write("s", n)).collect())
        .await
        .unwrap();

    client.fail_document(
        Operation::DeleteDocument,
        "jrnl-s-2",
        StoreError::Unavailable("replica down".into()),
    );
    let err = journal.delete_messages_to("s", 3).await.unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::DeleteFailed { failed: 1, total: 3, .. }
    ));

    client.clear_faults();
    journal.delete_messages_to("s", 3).await.unwrap();

    let mut remaining = Vec::new();
    journal
        .replay_messages("s", 1, u64::MAX, u64::MAX, |e| remaining.push(e.sequence_nr))
        .await
        .unwrap();
    assert_eq!(remaining, vec![4]);
}

// ==================== Settings ====================

#[test]
fn test_settings_from_json() {
    let settings = PersistenceSettings::from_json(
        r#"{
            "journal": { "auto-initialize": true, "database": "Orders" },
            "snapshot-store": { "collection": "snapshots" }
        }"#,
    )
    .unwrap();

    assert!(settings.journal.store.auto_initialize);
    assert_eq!(settings.journal.store.database, "Orders");
    assert_eq!(settings.journal.metadata_collection, "persistence");
    assert!(!settings.snapshot_store.store.auto_initialize);
    assert_eq!(settings.snapshot_store.store.collection, "snapshots");
}

#[test]
fn test_invalid_settings_are_rejected_by_engines() {
    let client = Arc::new(MemoryDocumentClient::new());
    let settings = JournalSettings::new(StoreSettings::new().with_max_concurrent_requests(0));

    let err = Journal::new(client, test_registry(), settings).err().unwrap();
    assert!(matches!(err, PersistenceError::Configuration(_)));
}

#[test]
fn test_replay_query_renders_as_sql() {
    use cosmosdb_persistence::store::{DocumentQuery, Predicate, SortOrder};

    let query = DocumentQuery::new()
        .filter(Predicate::eq("streamId", "user-42"))
        .filter(Predicate::eq("documentType", "jrnl"))
        .filter(Predicate::ge("sequenceNr", 1))
        .order_by("sequenceNr", SortOrder::Ascending)
        .limit(10);

    let sql: SqlQuerySpec = query.to_sql();
    let wire = serde_json::to_value(&sql).unwrap();
    assert_eq!(
        wire["query"],
        "SELECT TOP 10 * FROM c WHERE c.streamId = @p0 AND c.documentType = @p1 \
         AND c.sequenceNr >= @p2 ORDER BY c.sequenceNr ASC"
    );
    assert_eq!(wire["parameters"][2]["value"], 1);
}
