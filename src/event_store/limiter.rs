//! Request limiter
//!
//! Caps how many per-document store requests one engine has in flight. A
//! large write batch or bulk delete fans out into one request per document;
//! without a cap that fan-out is unbounded.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Semaphore-backed cap on concurrent store requests
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl RequestLimiter {
    /// Allow at most `limit` requests at once (at least one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `request` once a permit is free
    pub async fn run<F>(&self, request: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed, so acquiring only waits.
        let _permit = self.permits.acquire().await.ok();
        request.await
    }
}
