//! Stream metadata document

use serde::{Deserialize, Serialize};

/// High-water mark of a stream
///
/// The id is the normalized stream id itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub id: String,
    pub stream_id: String,
    pub sequence_nr: u64,
    #[serde(default = "MetadataEntry::default_document_type")]
    pub document_type: String,
}

impl MetadataEntry {
    pub const DOCUMENT_TYPE: &'static str = "meta";

    pub fn new(stream_id: &str, sequence_nr: u64) -> Self {
        Self {
            id: stream_id.to_string(),
            stream_id: stream_id.to_string(),
            sequence_nr,
            document_type: Self::DOCUMENT_TYPE.to_string(),
        }
    }

    fn default_document_type() -> String {
        Self::DOCUMENT_TYPE.to_string()
    }
}
