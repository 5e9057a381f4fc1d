//! Collection provisioning
//!
//! Resolves the database and collections an engine works against, creating
//! them when auto-initialization is on. Each resource is resolved at most
//! once per engine: concurrent first callers wait on the same resolution.
//! A failed resolution is not remembered, so the next call tries again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::StoreSettings;
use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{CollectionSpec, Database, DocumentClient, DocumentCollection, StoreError};

/// Memoized database and collection handles of one engine
pub struct CollectionProvisioner {
    client: Arc<dyn DocumentClient>,
    database_id: String,
    auto_initialize: bool,
    throughput: u32,
    database: OnceCell<Database>,
    collections: Mutex<HashMap<String, Arc<OnceCell<DocumentCollection>>>>,
}

impl CollectionProvisioner {
    pub fn new(client: Arc<dyn DocumentClient>, settings: &StoreSettings) -> Self {
        Self {
            client,
            database_id: settings.database.clone(),
            auto_initialize: settings.auto_initialize,
            throughput: settings.throughput,
            database: OnceCell::new(),
            collections: Mutex::new(HashMap::new()),
        }
    }

    /// The engine's database, resolved on first use
    pub async fn database(&self) -> PersistenceResult<&Database> {
        self.database
            .get_or_try_init(|| self.resolve_database())
            .await
    }

    /// A collection of the engine's database, resolved on first use
    ///
    /// Requests for the same collection id share one resolution.
    pub async fn collection(&self, id: &str) -> PersistenceResult<DocumentCollection> {
        let cell = self
            .collections
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone();

        cell.get_or_try_init(|| self.resolve_collection(id))
            .await
            .cloned()
    }

    async fn resolve_database(&self) -> PersistenceResult<Database> {
        if let Some(database) = self.client.query_database(&self.database_id).await? {
            debug!(database = %database.id, "resolved database");
            return Ok(database);
        }

        if !self.auto_initialize {
            return Err(PersistenceError::Configuration(format!(
                "database {:?} does not exist; enable auto-initialize to create it",
                self.database_id
            )));
        }

        match self.client.create_database(&self.database_id).await {
            Ok(database) => {
                info!(database = %database.id, "created database");
                Ok(database)
            }
            // created elsewhere in the meantime
            Err(StoreError::Conflict(_)) => self
                .client
                .query_database(&self.database_id)
                .await?
                .ok_or_else(|| StoreError::NotFound(self.database_id.clone()).into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_collection(&self, id: &str) -> PersistenceResult<DocumentCollection> {
        let database = self.database().await?;

        if let Some(collection) = self.client.query_collection(database, id).await? {
            debug!(collection = %collection.id, "resolved collection");
            return Ok(collection);
        }

        if !self.auto_initialize {
            return Err(PersistenceError::Configuration(format!(
                "collection {:?} in database {:?} does not exist; enable auto-initialize to create it",
                id, database.id
            )));
        }

        let spec = CollectionSpec::partitioned_by_stream(id, self.throughput);
        match self.client.create_collection(database, &spec).await {
            Ok(collection) => {
                info!(
                    collection = %collection.id,
                    partition_key = %collection.partition_key_path,
                    throughput = spec.throughput,
                    "created collection"
                );
                Ok(collection)
            }
            Err(StoreError::Conflict(_)) => self
                .client
                .query_collection(database, id)
                .await?
                .ok_or_else(|| StoreError::NotFound(id.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }
}
