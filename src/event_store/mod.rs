//! Journal and snapshot store engines
//!
//! This module provides the persistence engines the host drives:
//! - `Journal`: append, replay, highest sequence number, delete-up-to
//! - `SnapshotStore`: save, load by criteria, delete
//! - `CollectionProvisioner`: resolves (and optionally creates) the
//!   database and collections once per engine
//! - `RequestLimiter`: caps concurrent per-document requests
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌─────────────┐    ┌──────────────────┐    ┌──────────────────────┐
//! │ AtomicWrite │───►│ encode payloads  │───►│ create_document × N  │──┐
//! │   batch     │    │ (registry)       │    │ (limited, concurrent)│  │
//! └─────────────┘    └──────────────────┘    └──────────────────────┘  ├─► per-group results
//!                    ┌──────────────────────────────────────────────┐  │
//!                    │ raise metadata (if-match _etag) per stream   │──┘
//!                    └──────────────────────────────────────────────┘
//!
//! Read Path (Recovery):
//! ┌───────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │ load snapshot │───►│ query events     │───►│ decode all,     │───► callback
//! │ by criteria   │    │ from..=to, max   │    │ then deliver    │
//! └───────────────┘    └──────────────────┘    └─────────────────┘
//! ```

mod bulk;
mod journal;
mod limiter;
mod provisioner;
mod snapshot;

pub use journal::Journal;
pub use limiter::RequestLimiter;
pub use provisioner::CollectionProvisioner;
pub use snapshot::SnapshotStore;
