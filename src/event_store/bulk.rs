//! Concurrent per-document deletes

use futures::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::error::{PersistenceError, PersistenceResult};
use crate::store::{DocumentClient, DocumentCollection};

use super::limiter::RequestLimiter;

/// Ids of the documents returned by a query
pub(crate) fn document_ids(documents: &[Value]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|doc| doc.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Delete every document in `ids` from one partition
///
/// All deletes run concurrently under the limiter. A document that is
/// already gone counts as deleted. Any other failure fails the whole call
/// after every delete has finished.
pub(crate) async fn delete_documents(
    client: &dyn DocumentClient,
    limiter: &RequestLimiter,
    collection: &DocumentCollection,
    partition_key: &str,
    ids: &[String],
) -> PersistenceResult<usize> {
    let deletes = ids.iter().map(|id| {
        limiter.run(client.delete_document(collection, partition_key, id))
    });

    let total = ids.len();
    let mut failed = 0;
    let mut first_error = None;
    for result in join_all(deletes).await {
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                failed += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        None => Ok(total),
        Some(source) => {
            warn!(
                partition = %partition_key,
                failed,
                total,
                error = %source,
                "bulk delete incomplete"
            );
            Err(PersistenceError::DeleteFailed {
                failed,
                total,
                source,
            })
        }
    }
}
