//! Snapshot document

use serde::{Deserialize, Serialize};

use crate::error::PersistenceResult;
use crate::serialization::{Payload, SerializerRegistry, StoredPayload};
use crate::store::Predicate;
use crate::types::{SelectedSnapshot, SnapshotMetadata};
use crate::utils::ids::is_normalized;
use crate::utils::DateTimeJson;

use super::fields;

/// One snapshot of a stream as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: String,
    pub stream_id: String,
    pub sequence_nr: u64,
    pub timestamp: DateTimeJson,
    pub snapshot: StoredPayload,
    #[serde(default)]
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer_id: Option<i32>,
    #[serde(default = "SnapshotEntry::default_document_type")]
    pub document_type: String,
}

impl SnapshotEntry {
    pub const DOCUMENT_TYPE: &'static str = "snap";

    /// Document id for a snapshot of an already normalized stream
    pub fn document_id(stream_id: &str, sequence_nr: u64) -> String {
        debug_assert!(is_normalized(stream_id), "stream id {:?} is not normalized", stream_id);
        format!("{}-{}-{}", Self::DOCUMENT_TYPE, stream_id, sequence_nr)
    }

    /// Encode a snapshot for the stream `stream_id` (normalized)
    pub fn new(
        metadata: &SnapshotMetadata,
        stream_id: &str,
        snapshot: &Payload,
        registry: &SerializerRegistry,
    ) -> PersistenceResult<Self> {
        let timestamp = DateTimeJson::from_datetime(&metadata.timestamp)?;
        let encoded = registry.encode(snapshot, None)?;

        Ok(Self {
            id: Self::document_id(stream_id, metadata.sequence_nr),
            stream_id: stream_id.to_string(),
            sequence_nr: metadata.sequence_nr,
            timestamp,
            snapshot: encoded.payload,
            manifest: encoded.manifest,
            serializer_id: encoded.serializer_id,
            document_type: Self::DOCUMENT_TYPE.to_string(),
        })
    }

    /// Decode into a snapshot attributed to `persistence_id`
    pub fn into_selected(
        self,
        persistence_id: &str,
        registry: &SerializerRegistry,
    ) -> PersistenceResult<SelectedSnapshot> {
        let timestamp = self.timestamp.to_datetime()?;
        let snapshot = registry.decode(self.snapshot, self.serializer_id, &self.manifest)?;
        Ok(SelectedSnapshot::new(
            SnapshotMetadata::new(persistence_id, self.sequence_nr, timestamp),
            snapshot,
        ))
    }

    fn default_document_type() -> String {
        Self::DOCUMENT_TYPE.to_string()
    }
}

/// Timestamp no later than `bound`: `date < D OR (date == D AND ticks <= T)`
pub fn timestamp_at_or_before(bound: &DateTimeJson) -> Predicate {
    Predicate::lt(fields::TIMESTAMP_DATE, bound.date).or(Predicate::eq(
        fields::TIMESTAMP_DATE,
        bound.date,
    )
    .and(Predicate::le(fields::TIMESTAMP_TICKS, bound.ticks)))
}

/// Timestamp exactly `value`: `date == D AND ticks == T`
pub fn timestamp_equals(value: &DateTimeJson) -> Predicate {
    Predicate::eq(fields::TIMESTAMP_DATE, value.date)
        .and(Predicate::eq(fields::TIMESTAMP_TICKS, value.ticks))
}
