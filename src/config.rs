//! Settings for the journal and the snapshot store
//!
//! Both engines share the connection and provisioning settings in
//! [`StoreSettings`]; the journal adds the metadata collection. Settings
//! deserialize from kebab-case keys and fall back to defaults for anything
//! missing:
//!
//! ```text
//! {
//!   "journal": {
//!     "service-uri": "https://account.documents.azure.com:443/",
//!     "secret-key": "...",
//!     "auto-initialize": true,
//!     "database": "Actors",
//!     "collection": "persistence",
//!     "metadata-collection": "persistence"
//!   },
//!   "snapshot-store": { "collection": "snapshots" }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::DEFAULT_THROUGHPUT;

/// Environment variable overriding `service-uri`
pub const SERVICE_URI_ENV: &str = "COSMOSDB_SERVICE_URI";

/// Environment variable overriding `secret-key`
pub const SECRET_KEY_ENV: &str = "COSMOSDB_SECRET_KEY";

/// Connection and provisioning settings shared by both engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StoreSettings {
    /// Store endpoint, used by network clients
    pub service_uri: String,
    /// Store credential, used by network clients
    pub secret_key: String,
    /// Create the database and collections when missing
    pub auto_initialize: bool,
    pub database: String,
    pub collection: String,
    /// Throughput for collections created by auto-initialization
    pub throughput: u32,
    /// Upper bound on concurrent per-document requests
    pub max_concurrent_requests: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            service_uri: String::new(),
            secret_key: String::new(),
            auto_initialize: false,
            database: "Actors".to_string(),
            collection: "persistence".to_string(),
            throughput: DEFAULT_THROUGHPUT,
            max_concurrent_requests: 32,
        }
    }
}

impl StoreSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_initialize(mut self, auto_initialize: bool) -> Self {
        self.auto_initialize = auto_initialize;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit;
        self
    }

    /// Reject settings the engines cannot run with
    pub fn validate(&self) -> PersistenceResult<()> {
        if self.database.trim().is_empty() {
            return Err(PersistenceError::Configuration(
                "database name must not be empty".into(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(PersistenceError::Configuration(
                "collection name must not be empty".into(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(PersistenceError::Configuration(
                "max-concurrent-requests must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup(SERVICE_URI_ENV) {
            self.service_uri = uri;
        }
        if let Some(key) = lookup(SECRET_KEY_ENV) {
            self.secret_key = key;
        }
    }
}

/// Journal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JournalSettings {
    #[serde(flatten)]
    pub store: StoreSettings,
    /// Collection holding the per-stream metadata documents
    pub metadata_collection: String,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            metadata_collection: "persistence".to_string(),
        }
    }
}

impl JournalSettings {
    pub fn new(store: StoreSettings) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    pub fn with_metadata_collection(mut self, collection: impl Into<String>) -> Self {
        self.metadata_collection = collection.into();
        self
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        self.store.validate()?;
        if self.metadata_collection.trim().is_empty() {
            return Err(PersistenceError::Configuration(
                "metadata collection name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Snapshot store settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SnapshotSettings {
    #[serde(flatten)]
    pub store: StoreSettings,
}

impl SnapshotSettings {
    pub fn new(store: StoreSettings) -> Self {
        Self { store }
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        self.store.validate()
    }
}

/// Settings of both engines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PersistenceSettings {
    pub journal: JournalSettings,
    pub snapshot_store: SnapshotSettings,
}

impl PersistenceSettings {
    /// Parse and validate settings from a JSON document
    pub fn from_json(json: &str) -> PersistenceResult<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| PersistenceError::Configuration(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Take the endpoint and credential from the environment when set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply endpoint and credential overrides from `lookup`
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.journal.store.apply_overrides(&lookup);
        self.snapshot_store.store.apply_overrides(&lookup);
        self
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        self.journal.validate()?;
        self.snapshot_store.validate()
    }
}
