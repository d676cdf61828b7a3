//! Paginated fetcher with transient-failure retry

use super::cursor::PaginationCursor;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::source::{GraphSource, SourceEntity};
use std::sync::Arc;
use tracing::debug;

/// Fetches ordered pages from a graph source
#[derive(Clone)]
pub struct PaginatedFetcher {
    source: Arc<dyn GraphSource>,
    retry: RetryPolicy,
}

impl PaginatedFetcher {
    /// Create a fetcher over `source` using `retry` for transient failures
    pub fn new(source: Arc<dyn GraphSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Retry policy in use
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch up to `limit` entities after skipping `offset`.
    ///
    /// Transient failures are retried per the policy; anything else, or an
    /// exhausted budget, is returned to the caller.
    pub async fn fetch_batch(&self, offset: u64, limit: u64) -> Result<Vec<SourceEntity>> {
        let source = &self.source;
        let batch = self
            .retry
            .run_transient("fetch batch", || source.fetch_range(offset, limit))
            .await?;
        debug!(offset, limit, fetched = batch.len(), "Fetched page");
        Ok(batch)
    }

    /// Fetch the page the cursor points at
    pub async fn fetch_at(&self, cursor: &PaginationCursor) -> Result<Vec<SourceEntity>> {
        self.fetch_batch(cursor.offset(), cursor.limit()).await
    }
}

impl std::fmt::Debug for PaginatedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedFetcher")
            .field("source", &self.source.describe())
            .field("retry", &self.retry)
            .finish()
    }
}
