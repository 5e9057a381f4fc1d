//! Journal - append-only event log per stream
//!
//! Events are stored one document per event in the journal collection,
//! partitioned by stream id. Each stream also has one metadata document
//! holding its highest sequence number, which survives deletion of the
//! events themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::config::JournalSettings;
use crate::documents::{fields, JournalEntry, MetadataEntry};
use crate::error::{PersistenceError, PersistenceResult};
use crate::serialization::SerializerRegistry;
use crate::store::{etag, DocumentClient, DocumentCollection, DocumentQuery, Predicate, SortOrder, StoreError, ETAG_FIELD};
use crate::types::{AtomicWrite, PersistentRepr};
use crate::utils::normalize;

use super::bulk::{delete_documents, document_ids};
use super::limiter::RequestLimiter;
use super::provisioner::CollectionProvisioner;

/// Conditional metadata writes tried before a lost race is reported
const METADATA_UPDATE_ATTEMPTS: usize = 16;

/// Event journal over a document store
pub struct Journal {
    settings: JournalSettings,
    client: Arc<dyn DocumentClient>,
    registry: Arc<SerializerRegistry>,
    provisioner: CollectionProvisioner,
    limiter: RequestLimiter,
}

impl Journal {
    /// Create a journal; nothing is resolved until first use or `initialize`
    pub fn new(
        client: Arc<dyn DocumentClient>,
        registry: Arc<SerializerRegistry>,
        settings: JournalSettings,
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
        settings: JournalSettings,
    ) -> PersistenceResult<Self> {
        let engine = Self::new(client, registry, settings)?;
        engine.initialize().await?;
        Ok(engine)
    }

    /// Get the configuration
    pub fn settings(&self) -> &JournalSettings {
        &self.settings
    }

    /// Resolve the database and both collections ahead of the first call
    pub async fn initialize(&self) -> PersistenceResult<()> {
        self.journal_collection().await?;
        self.metadata_collection().await?;
        Ok(())
    }

    /// Persist a batch of atomic writes
    ///
    /// All events of all groups are written concurrently, together with one
    /// conditional metadata update per stream raising its high-water mark to
    /// the batch maximum. Returns one result per group, in order: `Ok` or the first
    /// failure of that group. Groups are not atomic; when a group fails some
    /// of its events may already be stored.
    ///
    /// The outer error is returned when the collections cannot be resolved
    /// or a metadata update fails (including reading the stored mark); the
    /// whole batch must then be considered failed.
    pub async fn write_messages(
        &self,
        writes: Vec<AtomicWrite>,
    ) -> PersistenceResult<Vec<PersistenceResult<()>>> {
        if writes.is_empty() {
            return Ok(Vec::new());
        }

        let journal = self.journal_collection().await?;
        let metadata = self.metadata_collection().await?;

        let mut highest: BTreeMap<String, u64> = BTreeMap::new();
        for write in &writes {
            let entry = highest.entry(normalize(write.persistence_id())).or_default();
            *entry = (*entry).max(write.highest_sequence_nr());
        }

        debug!(
            groups = writes.len(),
            streams = highest.len(),
            events = writes.iter().map(AtomicWrite::len).sum::<usize>(),
            "writing batch"
        );

        let group_writes = join_all(writes.iter().map(|write| self.write_group(&journal, write)));
        let metadata_writes = join_all(
            highest
                .iter()
                .map(|(stream_id, seq)| self.raise_highest_sequence_nr(&metadata, stream_id, *seq)),
        );
        let (results, metadata_results) = tokio::join!(group_writes, metadata_writes);

        for result in metadata_results {
            result?;
        }

        for (write, result) in writes.iter().zip(&results) {
            if let Err(e) = result {
                warn!(
                    stream_id = %write.persistence_id(),
                    from = write.lowest_sequence_nr(),
                    to = write.highest_sequence_nr(),
                    error = %e,
                    "atomic write failed"
                );
            }
        }

        Ok(results)
    }

    /// Highest sequence number ever written to the stream
    ///
    /// 0 when the stream has no metadata or the metadata cannot be read.
    /// Failures are logged, never returned.
    pub async fn read_highest_sequence_nr(&self, persistence_id: &str, from_sequence_nr: u64) -> u64 {
        let stream_id = normalize(persistence_id);
        match self.stored_highest_sequence_nr(&stream_id).await {
            Ok(seq) => {
                debug!(stream_id = %stream_id, from_sequence_nr, highest = seq, "read highest sequence number");
                seq
            }
            Err(e) => {
                warn!(stream_id = %stream_id, error = %e, "could not read stream metadata, assuming 0");
                0
            }
        }
    }

    /// Replay events `from..=to` of a stream, at most `max` of them
    ///
    /// Every event is decoded before the first callback; a decoding failure
    /// fails the replay without delivering anything.
    #[instrument(skip(self, callback), fields(stream_id = %persistence_id))]
    pub async fn replay_messages<F>(
        &self,
        persistence_id: &str,
        from_sequence_nr: u64,
        to_sequence_nr: u64,
        max: u64,
        mut callback: F,
    ) -> PersistenceResult<()>
    where
        F: FnMut(PersistentRepr),
    {
        let limit = max.min(i32::MAX as u64) as usize;
        if limit == 0 {
            return Ok(());
        }

        let stream_id = normalize(persistence_id);
        let journal = self.journal_collection().await?;

        let mut query = self
            .events_query(&stream_id)
            .filter(Predicate::ge(fields::SEQUENCE_NR, from_sequence_nr));
        if to_sequence_nr != u64::MAX {
            query = query.filter(Predicate::le(fields::SEQUENCE_NR, to_sequence_nr));
        }
        let query = query
            .order_by(fields::SEQUENCE_NR, SortOrder::Ascending)
            .limit(limit);

        let documents = self.client.query_documents(&journal, &stream_id, &query).await?;

        let events = documents
            .into_iter()
            .map(|doc| -> PersistenceResult<PersistentRepr> {
                let entry: JournalEntry = serde_json::from_value(doc)?;
                Ok(entry.into_repr(persistence_id, &self.registry)?)
            })
            .collect::<PersistenceResult<Vec<_>>>()?;

        debug!(count = events.len(), "replaying events");
        for event in events {
            callback(event);
        }
        Ok(())
    }

    /// Physically delete every event up to and including `to_sequence_nr`
    ///
    /// `u64::MAX` deletes all events of the stream. The metadata document
    /// is kept, so the highest sequence number is unchanged.
    #[instrument(skip(self), fields(stream_id = %persistence_id))]
    pub async fn delete_messages_to(&self, persistence_id: &str, to_sequence_nr: u64) -> PersistenceResult<()> {
        let stream_id = normalize(persistence_id);
        let journal = self.journal_collection().await?;

        let mut query = self.events_query(&stream_id);
        if to_sequence_nr != u64::MAX {
            query = query.filter(Predicate::le(fields::SEQUENCE_NR, to_sequence_nr));
        }

        let documents = self.client.query_documents(&journal, &stream_id, &query).await?;
        let ids = document_ids(&documents);
        let deleted = delete_documents(
            self.client.as_ref(),
            &self.limiter,
            &journal,
            &stream_id,
            &ids,
        )
        .await?;

        debug!(deleted, "deleted events");
        Ok(())
    }

    async fn journal_collection(&self) -> PersistenceResult<DocumentCollection> {
        self.provisioner.collection(&self.settings.store.collection).await
    }

    async fn metadata_collection(&self) -> PersistenceResult<DocumentCollection> {
        self.provisioner.collection(&self.settings.metadata_collection).await
    }

    fn events_query(&self, stream_id: &str) -> DocumentQuery {
        DocumentQuery::new()
            .filter(Predicate::eq(fields::STREAM_ID, stream_id))
            .filter(Predicate::eq(fields::DOCUMENT_TYPE, JournalEntry::DOCUMENT_TYPE))
    }

    /// Encode and create every event of one group
    async fn write_group(&self, journal: &DocumentCollection, write: &AtomicWrite) -> PersistenceResult<()> {
        let stream_id = normalize(write.persistence_id());

        let documents = write
            .events()
            .iter()
            .map(|event| -> PersistenceResult<(u64, serde_json::Value)> {
                let entry = JournalEntry::from_repr(event, &stream_id, &self.registry)?;
                Ok((event.sequence_nr, serde_json::to_value(&entry)?))
            })
            .collect::<PersistenceResult<Vec<_>>>()?;

        let creates = documents.into_iter().map(|(sequence_nr, document)| {
            let stream_id = &stream_id;
            async move {
                self.limiter
                    .run(self.client.create_document(journal, stream_id, document))
                    .await
                    .map_err(|e| match e {
                        StoreError::Conflict(_) => PersistenceError::DuplicateEvent {
                            stream_id: write.persistence_id().to_string(),
                            sequence_nr,
                        },
                        other => PersistenceError::Store(other),
                    })
            }
        });

        join_all(creates).await.into_iter().collect()
    }

    /// Raise the metadata document to at least `sequence_nr`
    ///
    /// Writes are conditional on the version that was read, so concurrent
    /// batches can only raise the mark. A lost race re-reads and retries.
    async fn raise_highest_sequence_nr(
        &self,
        metadata: &DocumentCollection,
        stream_id: &str,
        sequence_nr: u64,
    ) -> PersistenceResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match self.client.read_document(metadata, stream_id, stream_id).await? {
                None => {
                    let document = serde_json::to_value(MetadataEntry::new(stream_id, sequence_nr))?;
                    self.limiter
                        .run(self.client.create_document(metadata, stream_id, document))
                        .await
                }
                Some(current) => {
                    let version = etag(&current).map(str::to_string).ok_or_else(|| {
                        StoreError::InvalidDocument(format!("metadata of {} has no {}", stream_id, ETAG_FIELD))
                    })?;
                    let stored: MetadataEntry = serde_json::from_value(current)?;
                    if stored.sequence_nr >= sequence_nr {
                        return Ok(());
                    }
                    let document = serde_json::to_value(MetadataEntry::new(stream_id, sequence_nr))?;
                    self.limiter
                        .run(self.client.replace_document(metadata, stream_id, document, &version))
                        .await
                }
            };

            match outcome {
                Ok(()) => return Ok(()),
                Err(e) if is_lost_race(&e) && attempt < METADATA_UPDATE_ATTEMPTS => {
                    debug!(stream_id = %stream_id, attempt, "metadata changed concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stored_highest_sequence_nr(&self, stream_id: &str) -> PersistenceResult<u64> {
        let metadata = self.metadata_collection().await?;
        self.read_metadata(&metadata, stream_id).await
    }

    async fn read_metadata(&self, metadata: &DocumentCollection, stream_id: &str) -> PersistenceResult<u64> {
        let Some(document) = self.client.read_document(metadata, stream_id, stream_id).await? else {
            return Ok(0);
        };
        let entry: MetadataEntry = serde_json::from_value(document)?;
        Ok(entry.sequence_nr)
    }
}

/// Another writer touched the metadata document between read and write
fn is_lost_race(error: &StoreError) -> bool {
    error.is_conflict() || error.is_precondition_failed() || error.is_not_found()
}
