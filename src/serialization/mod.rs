//! Payload encoding
//!
//! Events and snapshots are opaque values to the engines. This module turns
//! them into document fields and back:
//!
//! - `Serializer`: pluggable value <-> bytes codec with a persistent id
//! - `SerializerRegistry`: picks the serializer for a runtime type on write
//!   and by id on read
//! - `StoredPayload`: the payload field as stored (inline JSON or base64)

mod payload;
mod registry;
mod serializer;

pub use payload::{EncodedPayload, StoredPayload};
pub use registry::{SerializerRegistry, SerializerRegistryBuilder, PASS_THROUGH_SERIALIZER_ID};
pub use serializer::{ByteArraySerializer, CodecError, JsonSerializer, Payload, Serializer};
