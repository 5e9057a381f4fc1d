//! Journal event document

use serde::{Deserialize, Serialize};

use crate::serialization::{CodecError, SerializerRegistry, StoredPayload};
use crate::types::PersistentRepr;
use crate::utils::ids::is_normalized;

/// One event of a stream as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub stream_id: String,
    pub sequence_nr: u64,
    #[serde(default)]
    pub is_deleted: bool,
    pub payload: StoredPayload,
    #[serde(default)]
    pub manifest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer_id: Option<i32>,
    #[serde(default = "JournalEntry::default_document_type")]
    pub document_type: String,
}

impl JournalEntry {
    pub const DOCUMENT_TYPE: &'static str = "jrnl";

    /// Document id for an event of an already normalized stream
    pub fn document_id(stream_id: &str, sequence_nr: u64) -> String {
        debug_assert!(is_normalized(stream_id), "stream id {:?} is not normalized", stream_id);
        format!("{}-{}-{}", Self::DOCUMENT_TYPE, stream_id, sequence_nr)
    }

    /// Encode an event for the stream `stream_id` (normalized)
    pub fn from_repr(
        repr: &PersistentRepr,
        stream_id: &str,
        registry: &SerializerRegistry,
    ) -> Result<Self, CodecError> {
        let hint = (!repr.manifest.is_empty()).then_some(repr.manifest.as_str());
        let encoded = registry.encode(&repr.payload, hint)?;

        Ok(Self {
            id: Self::document_id(stream_id, repr.sequence_nr),
            stream_id: stream_id.to_string(),
            sequence_nr: repr.sequence_nr,
            is_deleted: repr.is_deleted,
            payload: encoded.payload,
            manifest: encoded.manifest,
            serializer_id: encoded.serializer_id,
            document_type: Self::DOCUMENT_TYPE.to_string(),
        })
    }

    /// Decode back into an event attributed to `persistence_id`
    pub fn into_repr(
        self,
        persistence_id: &str,
        registry: &SerializerRegistry,
    ) -> Result<PersistentRepr, CodecError> {
        let payload = registry.decode(self.payload, self.serializer_id, &self.manifest)?;
        Ok(PersistentRepr {
            persistence_id: persistence_id.to_string(),
            sequence_nr: self.sequence_nr,
            payload,
            manifest: self.manifest,
            is_deleted: self.is_deleted,
        })
    }

    fn default_document_type() -> String {
        Self::DOCUMENT_TYPE.to_string()
    }
}
