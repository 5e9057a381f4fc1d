//! Serializer trait and built-in serializers

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A decoded application value, as handed to and received from the host
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Errors raised while encoding or decoding payloads
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no serializer is bound for payload type {0:?}")]
    UnboundType(TypeId),
    #[error("payload type {type_name} is bound twice (serializers {first} and {second})")]
    DuplicateBinding {
        type_name: &'static str,
        first: i32,
        second: i32,
    },
    #[error("unknown serializer id {0}")]
    UnknownSerializer(i32),
    #[error("serializer {serializer_id} has no decoder for manifest {manifest:?}")]
    UnknownManifest { serializer_id: i32, manifest: String },
    #[error("serializer {serializer_id} expected a payload of type {expected}")]
    TypeMismatch {
        serializer_id: i32,
        expected: &'static str,
    },
    #[error("serializer {0} stores binary payloads but the document holds an inline value")]
    UnexpectedInline(i32),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serializer {serializer_id} failed: {message}")]
    Custom { serializer_id: i32, message: String },
}

/// A pluggable payload serializer
///
/// Serializers turn values into bytes and back. The identifier is persisted
/// next to every payload and selects the serializer on read, so it must
/// never change once data has been written with it.
pub trait Serializer: Send + Sync {
    /// Persistent identifier of this serializer
    fn identifier(&self) -> i32;

    /// String manifest for a value, for serializers that carry one
    ///
    /// Returning `None` leaves the manifest chosen by the caller in place.
    fn manifest(&self, _payload: &(dyn Any + Send + Sync)) -> Option<String> {
        None
    }

    /// Encode a value
    fn to_binary(&self, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError>;

    /// Decode a value previously produced by `to_binary`
    fn from_binary(&self, bytes: &[u8], manifest: &str) -> Result<Payload, CodecError>;

    /// Runtime types this serializer handles, with their type names
    ///
    /// The registry binds these automatically when the serializer is added.
    fn bound_types(&self) -> Vec<(TypeId, &'static str)> {
        Vec::new()
    }
}

type EncodeFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError> + Send + Sync>;
type DecodeFn = Box<dyn Fn(&[u8]) -> Result<Payload, CodecError> + Send + Sync>;

struct JsonBinding {
    manifest: String,
    type_name: &'static str,
    encode: EncodeFn,
}

/// JSON serializer, stored inline as native document values
///
/// Every type is registered under an explicit manifest. Older manifests can
/// be kept readable with [`JsonSerializer::alias`] when a type is renamed or
/// its schema is versioned.
#[derive(Default)]
pub struct JsonSerializer {
    bindings: HashMap<TypeId, JsonBinding>,
    decoders: HashMap<String, DecodeFn>,
}

impl JsonSerializer {
    /// Reserved identifier: payloads are stored inline, not as bytes
    pub const IDENTIFIER: i32 = 1;

    /// Create an empty JSON serializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under its manifest (used for writing and reading)
    pub fn register<T>(mut self, manifest: impl Into<String>) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let manifest = manifest.into();
        let encode: EncodeFn = Box::new(|payload: &(dyn Any + Send + Sync)| -> Result<Vec<u8>, CodecError> {
            let value = payload
                .downcast_ref::<T>()
                .ok_or(CodecError::TypeMismatch {
                    serializer_id: Self::IDENTIFIER,
                    expected: type_name::<T>(),
                })?;
            Ok(serde_json::to_vec(value)?)
        });

        self.bindings.insert(
            TypeId::of::<T>(),
            JsonBinding {
                manifest: manifest.clone(),
                type_name: type_name::<T>(),
                encode,
            },
        );
        self.decoders.insert(manifest, Self::decoder::<T>());
        self
    }

    /// Register an additional manifest that decodes into `T` (read only)
    pub fn alias<T>(mut self, manifest: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.decoders.insert(manifest.into(), Self::decoder::<T>());
        self
    }

    /// Manifest written for values of type `T`, if registered
    pub fn manifest_of<T: 'static>(&self) -> Option<&str> {
        self.bindings
            .get(&TypeId::of::<T>())
            .map(|b| b.manifest.as_str())
    }

    fn decoder<T>() -> DecodeFn
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Box::new(|bytes: &[u8]| -> Result<Payload, CodecError> {
            let value: T = serde_json::from_slice(bytes)?;
            Ok(Arc::new(value) as Payload)
        })
    }
}

impl Serializer for JsonSerializer {
    fn identifier(&self) -> i32 {
        Self::IDENTIFIER
    }

    fn manifest(&self, payload: &(dyn Any + Send + Sync)) -> Option<String> {
        self.bindings
            .get(&Any::type_id(payload))
            .map(|b| b.manifest.clone())
    }

    fn to_binary(&self, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError> {
        let binding = self
            .bindings
            .get(&Any::type_id(payload))
            .ok_or(CodecError::UnboundType(Any::type_id(payload)))?;
        (binding.encode)(payload)
    }

    fn from_binary(&self, bytes: &[u8], manifest: &str) -> Result<Payload, CodecError> {
        let decode = self
            .decoders
            .get(manifest)
            .ok_or_else(|| CodecError::UnknownManifest {
                serializer_id: Self::IDENTIFIER,
                manifest: manifest.to_string(),
            })?;
        decode(bytes)
    }

    fn bound_types(&self) -> Vec<(TypeId, &'static str)> {
        self.bindings
            .iter()
            .map(|(id, b)| (*id, b.type_name))
            .collect()
    }
}

/// Raw byte payloads (`Vec<u8>`), stored base64-encoded
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteArraySerializer;

impl ByteArraySerializer {
    pub const IDENTIFIER: i32 = 4;
}

impl Serializer for ByteArraySerializer {
    fn identifier(&self) -> i32 {
        Self::IDENTIFIER
    }

    fn to_binary(&self, payload: &(dyn Any + Send + Sync)) -> Result<Vec<u8>, CodecError> {
        payload
            .downcast_ref::<Vec<u8>>()
            .cloned()
            .ok_or(CodecError::TypeMismatch {
                serializer_id: Self::IDENTIFIER,
                expected: type_name::<Vec<u8>>(),
            })
    }

    fn from_binary(&self, bytes: &[u8], _manifest: &str) -> Result<Payload, CodecError> {
        Ok(Arc::new(bytes.to_vec()) as Payload)
    }

    fn bound_types(&self) -> Vec<(TypeId, &'static str)> {
        vec![(TypeId::of::<Vec<u8>>(), type_name::<Vec<u8>>())]
    }
}
