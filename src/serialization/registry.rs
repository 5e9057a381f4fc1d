//! Serializer registry
//!
//! Maps runtime payload types to serializers for writing, and serializer ids
//! to serializers for reading. The registry is assembled once at startup and
//! is immutable afterwards.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::payload::{EncodedPayload, StoredPayload};
use super::serializer::{ByteArraySerializer, CodecError, JsonSerializer, Payload, Serializer};

/// Serializer id whose payloads are stored inline as native JSON
pub const PASS_THROUGH_SERIALIZER_ID: i32 = JsonSerializer::IDENTIFIER;

#[derive(Debug, Clone, Copy)]
struct Binding {
    serializer_id: i32,
    type_name: &'static str,
}

/// Immutable set of serializers and type bindings
#[derive(Clone)]
pub struct SerializerRegistry {
    serializers: HashMap<i32, Arc<dyn Serializer>>,
    bindings: HashMap<TypeId, Binding>,
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.serializers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("SerializerRegistry")
            .field("serializers", &ids)
            .field("bound_types", &self.bindings.len())
            .finish()
    }
}

impl SerializerRegistry {
    /// Start building a registry
    pub fn builder() -> SerializerRegistryBuilder {
        SerializerRegistryBuilder::default()
    }

    /// Registry with the built-in serializers and the given JSON types
    pub fn with_json(json: JsonSerializer) -> Result<Self, CodecError> {
        Self::builder()
            .serializer(Arc::new(json))
            .serializer(Arc::new(ByteArraySerializer))
            .build()
    }

    /// Serializer registered under `id`
    pub fn serializer(&self, id: i32) -> Result<&Arc<dyn Serializer>, CodecError> {
        self.serializers
            .get(&id)
            .ok_or(CodecError::UnknownSerializer(id))
    }

    /// Serializer bound to the runtime type of `payload`
    pub fn find_serializer_for(
        &self,
        payload: &(dyn Any + Send + Sync),
    ) -> Result<(&Arc<dyn Serializer>, &'static str), CodecError> {
        let type_id = Any::type_id(payload);
        let binding = self
            .bindings
            .get(&type_id)
            .ok_or(CodecError::UnboundType(type_id))?;
        Ok((self.serializer(binding.serializer_id)?, binding.type_name))
    }

    /// Encode a payload for storage
    ///
    /// The manifest is `manifest_hint` when non-empty, else the bound type
    /// name; a serializer that supplies its own manifest overrides both.
    /// Unbound `serde_json::Value` payloads are stored as-is with no
    /// serializer id.
    pub fn encode(
        &self,
        payload: &Payload,
        manifest_hint: Option<&str>,
    ) -> Result<EncodedPayload, CodecError> {
        let hint = manifest_hint.filter(|m| !m.trim().is_empty());

        let (serializer, type_name) = match self.find_serializer_for(payload.as_ref()) {
            Ok(found) => found,
            Err(CodecError::UnboundType(_)) if payload.is::<Value>() => {
                let value = payload.downcast_ref::<Value>().cloned().unwrap_or_default();
                return Ok(EncodedPayload {
                    payload: StoredPayload::Inline(value),
                    manifest: hint.unwrap_or(std::any::type_name::<Value>()).to_string(),
                    serializer_id: None,
                });
            }
            Err(e) => return Err(e),
        };

        let serializer_id = serializer.identifier();
        let manifest = serializer
            .manifest(payload.as_ref())
            .unwrap_or_else(|| hint.unwrap_or(type_name).to_string());

        let bytes = serializer.to_binary(payload.as_ref())?;
        let stored = if serializer_id == PASS_THROUGH_SERIALIZER_ID {
            StoredPayload::Inline(serde_json::from_slice(&bytes)?)
        } else {
            StoredPayload::encode_bytes(&bytes)
        };

        Ok(EncodedPayload {
            payload: stored,
            manifest,
            serializer_id: Some(serializer_id),
        })
    }

    /// Decode a stored payload
    ///
    /// Without a serializer id the stored value itself is the payload, as a
    /// `serde_json::Value`.
    pub fn decode(
        &self,
        stored: StoredPayload,
        serializer_id: Option<i32>,
        manifest: &str,
    ) -> Result<Payload, CodecError> {
        let Some(id) = serializer_id else {
            return Ok(Arc::new(stored.into_native()));
        };

        let serializer = self.serializer(id)?;
        let bytes = if id == PASS_THROUGH_SERIALIZER_ID {
            serde_json::to_vec(&stored.into_native())?
        } else {
            stored.decode_bytes(id)?
        };
        serializer.from_binary(&bytes, manifest)
    }
}

/// Builder for [`SerializerRegistry`]
#[derive(Default)]
pub struct SerializerRegistryBuilder {
    serializers: Vec<Arc<dyn Serializer>>,
    explicit: Vec<(TypeId, Binding)>,
}

impl SerializerRegistryBuilder {
    /// Add a serializer and bind the types it declares
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializers.push(serializer);
        self
    }

    /// Bind `T` to the serializer with `serializer_id`
    ///
    /// Explicit bindings override the types a serializer declares.
    pub fn bind<T: Any>(mut self, serializer_id: i32) -> Self {
        self.explicit.push((
            TypeId::of::<T>(),
            Binding {
                serializer_id,
                type_name: std::any::type_name::<T>(),
            },
        ));
        self
    }

    /// Validate bindings and build the registry
    pub fn build(self) -> Result<SerializerRegistry, CodecError> {
        let mut serializers = HashMap::new();
        let mut bindings: HashMap<TypeId, Binding> = HashMap::new();

        for serializer in self.serializers {
            let id = serializer.identifier();
            for (type_id, type_name) in serializer.bound_types() {
                if let Some(existing) = bindings.get(&type_id) {
                    if existing.serializer_id != id {
                        return Err(CodecError::DuplicateBinding {
                            type_name,
                            first: existing.serializer_id,
                            second: id,
                        });
                    }
                }
                bindings.insert(
                    type_id,
                    Binding {
                        serializer_id: id,
                        type_name,
                    },
                );
            }
            serializers.insert(id, serializer);
        }

        for (type_id, binding) in self.explicit {
            if !serializers.contains_key(&binding.serializer_id) {
                return Err(CodecError::UnknownSerializer(binding.serializer_id));
            }
            bindings.insert(type_id, binding);
        }

        Ok(SerializerRegistry {
            serializers,
            bindings,
        })
    }
}
