//! Snapshot store
//!
//! Snapshots are point-in-time captures of a stream's state that let the
//! host skip replaying older events. One document per (stream, sequence
//! number); saving the same identity again replaces it.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::SnapshotSettings;
use crate::documents::{fields, timestamp_at_or_before, timestamp_equals, SnapshotEntry};
use crate::error::PersistenceResult;
use crate::serialization::{Payload, SerializerRegistry};
use crate::store::{DocumentClient, DocumentCollection, DocumentQuery, Predicate, SortOrder};
use crate::types::{SelectedSnapshot, SnapshotMetadata, SnapshotSelectionCriteria};
use crate::utils::{normalize, DateTimeJson};

use super::bulk::{delete_documents, document_ids};
use super::limiter::RequestLimiter;
use super::provisioner::CollectionProvisioner;

/// Snapshot store over a document store
pub struct SnapshotStore {
    settings: SnapshotSettings,
    client: Arc<dyn DocumentClient>,
    registry: Arc<SerializerRegistry>,
    provisioner: CollectionProvisioner,
    limiter: RequestLimiter,
}

impl SnapshotStore {
    /// Create a snapshot store; nothing is resolved until first use
    pub fn new(
        client: Arc<dyn DocumentClient>,
        registry: Arc<SerializerRegistry>,
        settings: SnapshotSettings,
    ) -> PersistenceResult<Self> {
        settings.validate()?;
        Ok(Self {
            provisioner: CollectionProvisioner::new(client.clone(), &settings.store),
            limiter: RequestLimiter::new(settings.store.max_concurrent_requests),
            settings,
            client,
            registry,
        })
    }

    /// Create the engine and resolve its collections before returning
    ///
    /// Fails with a configuration error when a resource is missing and
    /// auto-initialization is off.
    pub async fn start(
        client: Arc<dyn DocumentClient>,
        registry: Arc<SerializerRegistry>,
        settings: SnapshotSettings,
    ) -> PersistenceResult<Self> {
        let engine = Self::new(client, registry, settings)?;
        engine.initialize().await?;
        Ok(engine)
    }

    /// Get the configuration
    pub fn settings(&self) -> &SnapshotSettings {
        &self.settings
    }

    /// Resolve the database and collection ahead of the first call
    pub async fn initialize(&self) -> PersistenceResult<()> {
        self.collection().await.map(|_| ())
    }

    /// Store a snapshot, replacing one with the same stream and sequence number
    #[instrument(skip(self, snapshot), fields(stream_id = %metadata.persistence_id, sequence_nr = metadata.sequence_nr))]
    pub async fn save(&self, metadata: &SnapshotMetadata, snapshot: Payload) -> PersistenceResult<()> {
        let stream_id = normalize(&metadata.persistence_id);
        let collection = self.collection().await?;

        let entry = SnapshotEntry::new(metadata, &stream_id, &snapshot, &self.registry)?;
        let document = serde_json::to_value(&entry)?;
        self.limiter
            .run(self.client.upsert_document(&collection, &stream_id, document))
            .await?;

        debug!(id = %entry.id, "saved snapshot");
        Ok(())
    }

    /// Newest snapshot of the stream within `criteria`, if any
    #[instrument(skip(self), fields(stream_id = %persistence_id))]
    pub async fn load(
        &self,
        persistence_id: &str,
        criteria: &SnapshotSelectionCriteria,
    ) -> PersistenceResult<Option<SelectedSnapshot>> {
        let stream_id = normalize(persistence_id);
        let collection = self.collection().await?;

        let query = self
            .criteria_query(&stream_id, criteria)?
            .order_by(fields::SEQUENCE_NR, SortOrder::Descending)
            .limit(1);
        let documents = self.client.query_documents(&collection, &stream_id, &query).await?;

        let Some(document) = documents.into_iter().next() else {
            debug!("no matching snapshot");
            return Ok(None);
        };
        let entry: SnapshotEntry = serde_json::from_value(document)?;
        let selected = entry.into_selected(persistence_id, &self.registry)?;

        debug!(sequence_nr = selected.metadata.sequence_nr, "loaded snapshot");
        Ok(Some(selected))
    }

    /// Delete the snapshot identified by `metadata`
    ///
    /// The sequence number and timestamp are matched exactly unless they
    /// hold an "any" marker (see [`SnapshotMetadata::exact_sequence_nr`] and
    /// [`SnapshotMetadata::exact_timestamp`]). Only the newest match is
    /// deleted; nothing happens when there is none.
    #[instrument(skip(self, metadata), fields(stream_id = %metadata.persistence_id, sequence_nr = metadata.sequence_nr))]
    pub async fn delete(&self, metadata: &SnapshotMetadata) -> PersistenceResult<()> {
        let stream_id = normalize(&metadata.persistence_id);
        let collection = self.collection().await?;

        let mut query = self.snapshots_query(&stream_id);
        if let Some(seq) = metadata.exact_sequence_nr() {
            query = query.filter(Predicate::eq(fields::SEQUENCE_NR, seq));
        }
        if let Some(timestamp) = metadata.exact_timestamp() {
            query = query.filter(timestamp_equals(&DateTimeJson::from_datetime(&timestamp)?));
        }
        let query = query
            .order_by(fields::SEQUENCE_NR, SortOrder::Descending)
            .limit(1);

        let documents = self.client.query_documents(&collection, &stream_id, &query).await?;
        let ids = document_ids(&documents);
        delete_documents(self.client.as_ref(), &self.limiter, &collection, &stream_id, &ids).await?;

        debug!(deleted = ids.len(), "deleted snapshot");
        Ok(())
    }

    /// Delete every snapshot of the stream within `criteria`
    #[instrument(skip(self), fields(stream_id = %persistence_id))]
    pub async fn delete_matching(
        &self,
        persistence_id: &str,
        criteria: &SnapshotSelectionCriteria,
    ) -> PersistenceResult<()> {
        let stream_id = normalize(persistence_id);
        let collection = self.collection().await?;

        let query = self.criteria_query(&stream_id, criteria)?;
        let documents = self.client.query_documents(&collection, &stream_id, &query).await?;
        let ids = document_ids(&documents);
        let deleted =
            delete_documents(self.client.as_ref(), &self.limiter, &collection, &stream_id, &ids).await?;

        debug!(deleted, "deleted matching snapshots");
        Ok(())
    }

    async fn collection(&self) -> PersistenceResult<DocumentCollection> {
        self.provisioner.collection(&self.settings.store.collection).await
    }

    fn snapshots_query(&self, stream_id: &str) -> DocumentQuery {
        DocumentQuery::new()
            .filter(Predicate::eq(fields::STREAM_ID, stream_id))
            .filter(Predicate::eq(fields::DOCUMENT_TYPE, SnapshotEntry::DOCUMENT_TYPE))
    }

    fn criteria_query(
        &self,
        stream_id: &str,
        criteria: &SnapshotSelectionCriteria,
    ) -> PersistenceResult<DocumentQuery> {
        let mut query = self.snapshots_query(stream_id);
        if let Some(max_seq) = criteria.sequence_bound() {
            query = query.filter(Predicate::le(fields::SEQUENCE_NR, max_seq));
        }
        if let Some(max_timestamp) = criteria.timestamp_bound() {
            let bound = DateTimeJson::from_datetime(&max_timestamp)?;
            query = query.filter(timestamp_at_or_before(&bound));
        }
        Ok(query)
    }
}
