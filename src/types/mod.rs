//! Data types exchanged with the host
//!
//! Events and snapshots as the host framework sees them, with decoded
//! payloads. Their stored shapes live in `documents`.

mod event;
mod snapshot;

pub use event::{AtomicWrite, PersistentRepr};
pub use snapshot::{SelectedSnapshot, SnapshotMetadata, SnapshotSelectionCriteria};
