//! Stored payload representation
//!
//! A payload field in a document is either a native JSON value (written by
//! the pass-through serializer, or by a host handing over raw JSON) or a
//! base64 string holding serializer bytes. Which one applies is decided by
//! the `serializerId` stored next to it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CodecError;

/// Payload as it lives inside a document
///
/// Serialized untagged so the document keeps a plain value or a plain
/// string in its payload field. A native JSON string therefore reads back as
/// `Encoded`; decoding consults the serializer id to tell the two apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredPayload {
    /// Base64 of the serializer output
    Encoded(String),
    /// Native JSON value
    Inline(Value),
}

impl StoredPayload {
    /// Wrap serializer bytes as base64
    pub fn encode_bytes(bytes: &[u8]) -> Self {
        StoredPayload::Encoded(BASE64.encode(bytes))
    }

    /// Bytes of an `Encoded` payload written by `serializer_id`
    pub fn decode_bytes(&self, serializer_id: i32) -> Result<Vec<u8>, CodecError> {
        match self {
            StoredPayload::Encoded(text) => Ok(BASE64.decode(text)?),
            StoredPayload::Inline(_) => Err(CodecError::UnexpectedInline(serializer_id)),
        }
    }

    /// Payload viewed as a native JSON value
    pub fn into_native(self) -> Value {
        match self {
            StoredPayload::Encoded(text) => Value::String(text),
            StoredPayload::Inline(value) => value,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, StoredPayload::Inline(_))
    }
}

/// Result of encoding a payload for storage
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPayload {
    pub payload: StoredPayload,
    pub manifest: String,
    /// `None` when the payload was handed over as raw JSON
    pub serializer_id: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_serialization() {
        let encoded = StoredPayload::encode_bytes(b"hi");
        assert_eq!(serde_json::to_value(&encoded).unwrap(), json!("aGk="));

        let inline = StoredPayload::Inline(json!({"a": 1}));
        assert_eq!(serde_json::to_value(&inline).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_strings_read_back_as_encoded() {
        let parsed: StoredPayload = serde_json::from_value(json!("aGk=")).unwrap();
        assert_eq!(parsed.decode_bytes(4).unwrap(), b"hi".to_vec());

        let parsed: StoredPayload = serde_json::from_value(json!([1, 2])).unwrap();
        assert!(parsed.is_inline());
        assert!(matches!(
            parsed.decode_bytes(4),
            Err(CodecError::UnexpectedInline(4))
        ));
        assert_eq!(parsed.into_native(), json!([1, 2]));
    }

    #[test]
    fn test_corrupt_base64_is_reported() {
        let payload = StoredPayload::Encoded("%%%".to_string());
        assert!(matches!(payload.decode_bytes(4), Err(CodecError::Base64(_))));
    }
}
