//! CosmosDB Persistence
//!
//! An event-sourcing journal and snapshot store layered over a partitioned
//! document database. Each stream maps to one partition; events, the
//! stream's high-water mark and its snapshots are stored as JSON documents.
//!
//! # Features
//!
//! - **Journal**: concurrent batch append, ordered replay, tolerant
//!   highest-sequence lookup, hard delete-up-to
//! - **Snapshots**: save, load newest by criteria, exact and bulk delete
//! - **Pluggable payloads**: serializers chosen per runtime type, inline JSON
//!   or base64 bytes in the stored document
//! - **Lazy provisioning**: database and collections resolved once per
//!   engine, optionally created
//! - **Bounded fan-out**: per-document requests capped per engine
//!
//! # Modules
//!
//! - `event_store`: `Journal`, `SnapshotStore` and their provisioning
//! - `store`: `DocumentClient` interface, query model, in-memory store
//! - `documents`: stored document shapes
//! - `serialization`: serializers and the payload codec
//! - `types`: events and snapshots as the host sees them
//! - `config`: settings
//! - `utils`: identifier normalization and timestamp encoding
//! - `telemetry`: logging setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cosmosdb_persistence::{
//!     AtomicWrite, JournalSettings, Journal, JsonSerializer, MemoryDocumentClient,
//!     PersistentRepr, SerializerRegistry, StoreSettings,
//! };
//!
//! # async fn run() -> cosmosdb_persistence::PersistenceResult<()> {
//! let registry = SerializerRegistry::with_json(JsonSerializer::new().register::<String>("text"))?;
//! let settings = JournalSettings::new(StoreSettings::new().with_auto_initialize(true));
//! let journal = Journal::new(Arc::new(MemoryDocumentClient::new()), Arc::new(registry), settings)?;
//!
//! let write = AtomicWrite::single(PersistentRepr::from_value("user-42", 1, "hello".to_string()))?;
//! for result in journal.write_messages(vec![write]).await? {
//!     result?;
//! }
//!
//! journal
//!     .replay_messages("user-42", 1, u64::MAX, u64::MAX, |event| {
//!         println!("{}: {:?}", event.sequence_nr, event.downcast_ref::<String>());
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod documents;
pub mod error;
pub mod event_store;
pub mod serialization;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{JournalSettings, PersistenceSettings, SnapshotSettings, StoreSettings};
pub use error::{PersistenceError, PersistenceResult};
pub use event_store::{Journal, SnapshotStore};
pub use serialization::{
    ByteArraySerializer, CodecError, JsonSerializer, Payload, Serializer, SerializerRegistry,
};
pub use store::{DocumentClient, MemoryDocumentClient, StoreError};
pub use types::{
    AtomicWrite, PersistentRepr, SelectedSnapshot, SnapshotMetadata, SnapshotSelectionCriteria,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
