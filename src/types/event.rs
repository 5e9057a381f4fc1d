//! Event types for the journal
//!
//! `PersistentRepr` is one event of a stream as the host sees it. Events are
//! handed to the journal in `AtomicWrite` groups and come back from replay one
//! by one, in sequence order.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{PersistenceError, PersistenceResult};
use crate::serialization::Payload;

/// A single persisted event
#[derive(Clone)]
pub struct PersistentRepr {
    /// Stream the event belongs to
    pub persistence_id: String,
    /// Position in the stream, starting at 1
    pub sequence_nr: u64,
    /// Decoded event value
    pub payload: Payload,
    /// Manifest the payload was written with (empty lets the registry choose)
    pub manifest: String,
    /// Legacy tombstone flag, stored but never used for filtering
    pub is_deleted: bool,
}

impl PersistentRepr {
    /// Create an event with an empty manifest
    pub fn new(persistence_id: impl Into<String>, sequence_nr: u64, payload: Payload) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            payload,
            manifest: String::new(),
            is_deleted: false,
        }
    }

    /// Wrap a concrete value as the payload
    pub fn from_value<T: Any + Send + Sync>(
        persistence_id: impl Into<String>,
        sequence_nr: u64,
        value: T,
    ) -> Self {
        Self::new(persistence_id, sequence_nr, Arc::new(value))
    }

    /// Set the manifest hint used when encoding
    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// Typed view of the payload
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for PersistentRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentRepr")
            .field("persistence_id", &self.persistence_id)
            .field("sequence_nr", &self.sequence_nr)
            .field("manifest", &self.manifest)
            .field("is_deleted", &self.is_deleted)
            .finish_non_exhaustive()
    }
}

/// Events of one stream that the host wants persisted together
///
/// The journal writes each event as its own document, so a group can be
/// partially persisted when the store fails midway. The group's result
/// reports the first failure.
#[derive(Debug, Clone)]
pub struct AtomicWrite {
    persistence_id: String,
    events: Vec<PersistentRepr>,
}

impl AtomicWrite {
    /// Validate and build a group
    ///
    /// The group must be non-empty, every event must belong to the same
    /// stream, and sequence numbers must be strictly ascending and non-zero.
    pub fn new(events: Vec<PersistentRepr>) -> PersistenceResult<Self> {
        let first = events
            .first()
            .ok_or_else(|| PersistenceError::InvalidWrite("atomic write has no events".into()))?;
        let persistence_id = first.persistence_id.clone();

        let mut previous = 0u64;
        for event in &events {
            if event.persistence_id != persistence_id {
                return Err(PersistenceError::InvalidWrite(format!(
                    "atomic write mixes streams {:?} and {:?}",
                    persistence_id, event.persistence_id
                )));
            }
            if event.sequence_nr <= previous {
                return Err(PersistenceError::InvalidWrite(format!(
                    "sequence number {} of stream {:?} does not follow {}",
                    event.sequence_nr, persistence_id, previous
                )));
            }
            previous = event.sequence_nr;
        }

        Ok(Self {
            persistence_id,
            events,
        })
    }

    /// Group holding a single event
    pub fn single(event: PersistentRepr) -> PersistenceResult<Self> {
        Self::new(vec![event])
    }

    pub fn persistence_id(&self) -> &str {
        &self.persistence_id
    }

    pub fn events(&self) -> &[PersistentRepr] {
        &self.events
    }

    pub fn lowest_sequence_nr(&self) -> u64 {
        self.events.first().map_or(0, |e| e.sequence_nr)
    }

    pub fn highest_sequence_nr(&self) -> u64 {
        self.events.last().map_or(0, |e| e.sequence_nr)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for a validated group
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
