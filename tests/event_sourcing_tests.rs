//! Event Sourcing Integration Tests
//!
//! Tests for the complete journal and snapshot flow including:
//! - Append, replay and delete-up-to on one stream
//! - Stream id normalization
//! - Snapshot save/load for inline and binary payloads
//! - State recovery from snapshot + events
//! - Decode faults during replay

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use cosmosdb_persistence::store::CollectionSpec;
use cosmosdb_persistence::{
    AtomicWrite, DocumentClient, Journal, JournalSettings, JsonSerializer, MemoryDocumentClient, PersistenceError,
    PersistentRepr, SerializerRegistry, SnapshotMetadata, SnapshotSelectionCriteria, SnapshotSettings,
    SnapshotStore, StoreSettings,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ItemAdded {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Cart {
    items: Vec<ItemAdded>,
}

fn test_registry() -> Arc<SerializerRegistry> {
    let json = JsonSerializer::new()
        .register::<ItemAdded>("item-added.v1")
        .register::<Cart>("cart.v1");
    Arc::new(SerializerRegistry::with_json(json).unwrap())
}

fn test_settings() -> StoreSettings {
    StoreSettings::new().with_auto_initialize(true)
}

fn test_journal(client: &Arc<MemoryDocumentClient>) -> Journal {
    Journal::new(client.clone(), test_registry(), JournalSettings::new(test_settings())).unwrap()
}

fn test_snapshot_store(client: &Arc<MemoryDocumentClient>) -> SnapshotStore {
    SnapshotStore::new(client.clone(), test_registry(), SnapshotSettings::new(test_settings())).unwrap()
}

fn item(n: u64) -> ItemAdded {
    ItemAdded {
        sku: format!("sku-{}", n),
        quantity: n as u32,
    }
}

fn single_write(stream: &str, seq: u64) -> AtomicWrite {
    AtomicWrite::single(PersistentRepr::from_value(stream, seq, item(seq))).unwrap()
}

async fn replay(journal: &Journal, stream: &str, from: u64, to: u64, max: u64) -> Vec<PersistentRepr> {
    let mut events = Vec::new();
    journal
        .replay_messages(stream, from, to, max, |event| events.push(event))
        .await
        .expect("replay failed");
    events
}

fn sequence_nrs(events: &[PersistentRepr]) -> Vec<u64> {
    events.iter().map(|e| e.sequence_nr).collect()
}

#[tokio::test]
async fn test_append_replay_delete_scenario() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);

    let writes = (1..=5).map(|n| single_write("user-42", n)).collect();
    let results = journal.write_messages(writes).await.unwrap();
    assert!(results.iter().all(Result::is_ok));

    let events = replay(&journal, "user-42", 1, 5, 10).await;
    assert_eq!(sequence_nrs(&events), vec![1, 2, 3, 4, 5]);
    assert_eq!(events[2].downcast_ref::<ItemAdded>(), Some(&item(3)));
    assert_eq!(events[2].manifest, "item-added.v1");

    journal.delete_messages_to("user-42", 3).await.unwrap();

    let events = replay(&journal, "user-42", 1, 5, 10).await;
    assert_eq!(sequence_nrs(&events), vec![4, 5]);
    assert_eq!(journal.read_highest_sequence_nr("user-42", 0).await, 5);
}

#[tokio::test]
async fn test_delete_all_keeps_high_water_mark() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);

    journal
        .write_messages((1..=3).map(|n| single_write("cart-1", n)).collect())
        .await
        .unwrap();
    journal.delete_messages_to("cart-1", u64::MAX).await.unwrap();

    assert!(replay(&journal, "cart-1", 1, u64::MAX, u64::MAX).await.is_empty());
    assert_eq!(journal.read_highest_sequence_nr("cart-1", 0).await, 3);

    // only the metadata document is left in the shared collection
    let remaining = client.documents("Actors", "persistence", "cart-1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["documentType"], "meta");
}

#[tokio::test]
async fn test_stream_ids_are_normalized() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);

    journal
        .write_messages(vec![single_write("order/99#x", 1)])
        .await
        .unwrap();

    let stored = client.documents("Actors", "persistence", "order-99-x");
    let ids: Vec<&str> = stored.iter().filter_map(|d| d["id"].as_str()).collect();
    assert!(ids.contains(&"jrnl-order-99-x-1"));
    assert!(ids.contains(&"order-99-x"));

    let events = replay(&journal, "order/99#x", 1, u64::MAX, 10).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].persistence_id, "order/99#x");
    assert_eq!(journal.read_highest_sequence_nr("order/99#x", 0).await, 1);
}

#[tokio::test]
async fn test_streams_are_isolated() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);

    journal
        .write_messages(vec![
            single_write("a", 1),
            single_write("b", 1),
            single_write("a", 2),
        ])
        .await
        .unwrap();
    journal.delete_messages_to("b", u64::MAX).await.unwrap();

    assert_eq!(sequence_nrs(&replay(&journal, "a", 1, u64::MAX, 100).await), vec![1, 2]);
    assert_eq!(journal.read_highest_sequence_nr("a", 0).await, 2);
    assert_eq!(journal.read_highest_sequence_nr("b", 0).await, 1);
}

#[tokio::test]
async fn test_replay_fails_whole_on_corrupt_payload() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);
    journal
        .write_messages((1..=2).map(|n| single_write("s", n)).collect())
        .await
        .unwrap();

    // a third event whose binary payload is not valid base64
    let collection = client.collection("Actors", "persistence").unwrap();
    client
        .create_document(
            &collection,
            "s",
            json!({
                "id": "jrnl-s-3",
                "streamId": "s",
                "sequenceNr": 3,
                "isDeleted": false,
                "payload": "not base64!",
                "manifest": "bytes",
                "serializerId": 4,
                "documentType": "jrnl"
            }),
        )
        .await
        .unwrap();

    let mut delivered = 0;
    let err = journal
        .replay_messages("s", 1, u64::MAX, u64::MAX, |_| delivered += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, PersistenceError::Codec(_)));
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn test_snapshot_round_trip_for_both_payload_kinds() {
    let client = Arc::new(MemoryDocumentClient::new());
    let store = test_snapshot_store(&client);
    let ts = Utc.with_ymd_and_hms(2024, 7, 4, 9, 30, 0).unwrap() + Duration::nanoseconds(1_234_500);

    let cart = Cart {
        items: vec![item(1), item(2)],
    };
    store
        .save(&SnapshotMetadata::new("cart-7", 2, ts), Arc::new(cart.clone()))
        .await
        .unwrap();
    let loaded = store
        .load("cart-7", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.to_object::<Cart>(), Some(cart));
    assert_eq!(loaded.metadata.timestamp, ts);

    let bytes = vec![0u8, 159, 146, 150];
    store
        .save(&SnapshotMetadata::new("blob-1", 1, ts), Arc::new(bytes.clone()))
        .await
        .unwrap();
    let loaded = store
        .load("blob-1", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.downcast_ref::<Vec<u8>>(), Some(&bytes));
}

#[tokio::test]
async fn test_snapshot_load_fails_on_undecodable_payload() {
    let client = Arc::new(MemoryDocumentClient::new());
    let store = test_snapshot_store(&client);
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    store
        .save(&SnapshotMetadata::new("cart-3", 1, ts), Arc::new(Cart { items: vec![item(1)] }))
        .await
        .unwrap();
    store
        .save(&SnapshotMetadata::new("blob-3", 1, ts), Arc::new(vec![1u8, 2, 3]))
        .await
        .unwrap();
    let collection = client.collection("Actors", "persistence").unwrap();

    // a manifest no serializer knows
    let mut cart = client.documents("Actors", "persistence", "cart-3").remove(0);
    cart["manifest"] = json!("cart.v9");
    client.upsert_document(&collection, "cart-3", cart).await.unwrap();

    let err = store
        .load("cart-3", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Codec(_)));

    // binary payload that is not valid base64
    let mut blob = client.documents("Actors", "persistence", "blob-3").remove(0);
    blob["snapshot"] = json!("not base64!");
    client.upsert_document(&collection, "blob-3", blob).await.unwrap();

    let err = store
        .load("blob-3", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap_err();
    assert!(matches!(err, PersistenceError::Codec(_)));
}

#[tokio::test]
async fn test_delete_by_sequence_ignores_timestamp() {
    let client = Arc::new(MemoryDocumentClient::new());
    let store = test_snapshot_store(&client);
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for seq in [1u64, 2, 3] {
        let meta = SnapshotMetadata::new("cart-1", seq, ts + Duration::minutes(seq as i64));
        store.save(&meta, Arc::new(Cart { items: vec![] })).await.unwrap();
    }

    // unset timestamp marker: match on the sequence number only
    let any_time = SnapshotMetadata::new("cart-1", 2, chrono::DateTime::<Utc>::MIN_UTC);
    store.delete(&any_time).await.unwrap();

    let ids: Vec<String> = client
        .documents("Actors", "persistence", "cart-1")
        .iter()
        .filter_map(|d| d["id"].as_str().map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["snap-cart-1-1", "snap-cart-1-3"]);
}

#[tokio::test]
async fn test_recovery_from_snapshot_and_events() {
    let client = Arc::new(MemoryDocumentClient::new());
    let journal = test_journal(&client);
    let snapshots = test_snapshot_store(&client);

    journal
        .write_messages((1..=6).map(|n| single_write("cart-9", n)).collect())
        .await
        .unwrap();

    let state_at_4 = Cart {
        items: (1..=4).map(item).collect(),
    };
    snapshots
        .save(&SnapshotMetadata::now("cart-9", 4), Arc::new(state_at_4))
        .await
        .unwrap();
    journal.delete_messages_to("cart-9", 4).await.unwrap();

    // recover: snapshot first, then the events after it
    let selected = snapshots
        .load("cart-9", &SnapshotSelectionCriteria::latest())
        .await
        .unwrap()
        .unwrap();
    let mut cart = selected.to_object::<Cart>().unwrap();
    let from = selected.metadata.sequence_nr + 1;
    let highest = journal.read_highest_sequence_nr("cart-9", from).await;

    journal
        .replay_messages("cart-9", from, highest, u64::MAX, |event| {
            if let Some(added) = event.downcast_ref::<ItemAdded>() {
                cart.items.push(added.clone());
            }
        })
        .await
        .unwrap();

    assert_eq!(cart.items, (1..=6).map(item).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_separate_metadata_collection() {
    let client = Arc::new(MemoryDocumentClient::new());
    client.seed_collection("Actors", CollectionSpec::partitioned_by_stream("events", 400));
    client.seed_collection("Actors", CollectionSpec::partitioned_by_stream("metadata", 400));

    let settings = JournalSettings::new(StoreSettings::new().with_collection("events"))
        .with_metadata_collection("metadata");
    let journal = Journal::start(client.clone(), test_registry(), settings).await.unwrap();

    journal
        .write_messages(vec![single_write("s", 1)])
        .await
        .unwrap();

    assert_eq!(client.document_count("Actors", "events"), 1);
    assert_eq!(client.document_count("Actors", "metadata"), 1);
    assert_eq!(journal.read_highest_sequence_nr("s", 0).await, 1);
}
