//! Snapshot types
//!
//! Identity of a snapshot is (stream, sequence number, timestamp). Hosts pick
//! snapshots with `SnapshotSelectionCriteria` and get a `SelectedSnapshot`
//! back.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::serialization::Payload;
use crate::utils::{is_unbounded, truncate_to_ticks};

/// Identity of a stored snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMetadata {
    pub persistence_id: String,
    pub sequence_nr: u64,
    /// Tick-precise creation time
    pub timestamp: DateTime<Utc>,
}

impl SnapshotMetadata {
    /// Create metadata; the timestamp is truncated to 100 ns precision
    pub fn new(persistence_id: impl Into<String>, sequence_nr: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            timestamp: truncate_to_ticks(timestamp),
        }
    }

    /// Metadata stamped with the current time
    pub fn now(persistence_id: impl Into<String>, sequence_nr: u64) -> Self {
        Self::new(persistence_id, sequence_nr, Utc::now())
    }

    /// Sequence number to match exactly on delete, `None` for any
    ///
    /// 0 and `u64::MAX` both mean "any sequence number".
    pub fn exact_sequence_nr(&self) -> Option<u64> {
        (self.sequence_nr > 0 && self.sequence_nr < u64::MAX).then_some(self.sequence_nr)
    }

    /// Timestamp to match exactly on delete, `None` for any
    ///
    /// The first and last storable instants both mean "any time".
    pub fn exact_timestamp(&self) -> Option<DateTime<Utc>> {
        (!is_unbounded(&self.timestamp)).then_some(self.timestamp)
    }
}

/// Upper bounds for choosing snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSelectionCriteria {
    /// Highest sequence number to consider; `u64::MAX` means unbounded
    pub max_sequence_nr: u64,
    /// Latest timestamp to consider; `None` means unbounded
    pub max_timestamp: Option<DateTime<Utc>>,
}

impl Default for SnapshotSelectionCriteria {
    fn default() -> Self {
        Self::latest()
    }
}

impl SnapshotSelectionCriteria {
    /// No bounds: selects the newest snapshot
    pub fn latest() -> Self {
        Self {
            max_sequence_nr: u64::MAX,
            max_timestamp: None,
        }
    }

    /// Bounded by sequence number only
    pub fn up_to(max_sequence_nr: u64) -> Self {
        Self {
            max_sequence_nr,
            max_timestamp: None,
        }
    }

    pub fn with_max_timestamp(mut self, max_timestamp: DateTime<Utc>) -> Self {
        self.max_timestamp = Some(truncate_to_ticks(max_timestamp));
        self
    }

    /// Sequence bound to filter on, if any
    pub fn sequence_bound(&self) -> Option<u64> {
        (self.max_sequence_nr < u64::MAX).then_some(self.max_sequence_nr)
    }

    /// Timestamp bound to filter on, if any
    pub fn timestamp_bound(&self) -> Option<DateTime<Utc>> {
        self.max_timestamp.filter(|ts| !is_unbounded(ts))
    }
}

/// A loaded snapshot with its decoded value
#[derive(Clone)]
pub struct SelectedSnapshot {
    pub metadata: SnapshotMetadata,
    pub snapshot: Payload,
}

impl SelectedSnapshot {
    pub fn new(metadata: SnapshotMetadata, snapshot: Payload) -> Self {
        Self { metadata, snapshot }
    }

    /// Typed view of the snapshot value
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.snapshot.downcast_ref::<T>()
    }

    /// Owned copy of the snapshot value, if it has type `T`
    pub fn to_object<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }

    /// Snapshot value as a shared `Arc<T>`
    pub fn into_arc<T: Any + Send + Sync>(self) -> Option<Arc<T>> {
        self.snapshot.downcast::<T>().ok()
    }
}

impl fmt::Debug for SelectedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedSnapshot")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
