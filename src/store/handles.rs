//! Database and collection handles

use serde::{Deserialize, Serialize};

use super::links::{collection_link, database_link};

/// Partition key path used for every collection the engines create
pub const PARTITION_KEY_PATH: &str = "/streamId";

/// Provisioned throughput for created collections
pub const DEFAULT_THROUGHPUT: u32 = 10100;

/// A resolved database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub id: String,
    pub self_link: String,
}

impl Database {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let self_link = database_link(&id);
        Self { id, self_link }
    }
}

/// A resolved collection inside a database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCollection {
    pub id: String,
    pub database_id: String,
    pub self_link: String,
    pub partition_key_path: String,
}

impl DocumentCollection {
    pub fn new(database: &Database, spec: &CollectionSpec) -> Self {
        Self {
            id: spec.id.clone(),
            database_id: database.id.clone(),
            self_link: collection_link(&database.id, &spec.id),
            partition_key_path: spec.partition_key_path.clone(),
        }
    }

    /// Top-level document field holding the partition key
    pub fn partition_key_field(&self) -> &str {
        self.partition_key_path.trim_start_matches('/')
    }
}

/// Parameters for creating a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub id: String,
    pub partition_key_path: String,
    pub throughput: u32,
}

impl CollectionSpec {
    /// Collection partitioned by stream id
    pub fn partitioned_by_stream(id: impl Into<String>, throughput: u32) -> Self {
        Self {
            id: id.into(),
            partition_key_path: PARTITION_KEY_PATH.to_string(),
            throughput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_handle() {
        let db = Database::new("Actors");
        let spec = CollectionSpec::partitioned_by_stream("persistence", DEFAULT_THROUGHPUT);
        let coll = DocumentCollection::new(&db, &spec);

        assert_eq!(db.self_link, "dbs/Actors");
        assert_eq!(coll.self_link, "dbs/Actors/colls/persistence");
        assert_eq!(coll.partition_key_field(), "streamId");
        assert_eq!(spec.throughput, 10100);
    }
}
