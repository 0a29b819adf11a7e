//! Hybrid query orchestration.
//!
//! One query flows through three steps:
//!
//! 1. If an image is present, embed it under the bulkhead and search the
//!    current snapshot for the `top_k` nearest logos. The hits become an id
//!    allowlist.
//! 2. Turn the words and class filter into a [`RecordFilter`].
//! 3. Ask the store for matching records, restricted to the allowlist when
//!    step 1 produced one.
//!
//! The image branch degrades: an undecodable image or a failed embedding
//! is logged and the query proceeds on text and class alone. Once an
//! embedding exists the allowlist is a hard restriction; a vector the index
//! cannot score (zero norm) selects no candidates. Admission failures and
//! dimension mismatches are not degraded, because retrying or fixing
//! configuration is the right response to those.

use crate::embedding::BulkheadEmbedder;
use crate::index::LiveIndex;
use crate::models::{SearchRequest, TrademarkId, TrademarkSummary};
use crate::storage::RecordStore;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Default number of ANN candidates taken from the index.
pub const DEFAULT_TOP_K: usize = 50;

/// Default per-query deadline.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes hybrid searches.
#[derive(Clone)]
pub struct QueryCoordinator {
    store: Arc<dyn RecordStore>,
    index: Arc<LiveIndex>,
    embedder: Arc<BulkheadEmbedder>,
    top_k: usize,
    deadline: Duration,
}

impl QueryCoordinator {
    /// Creates a coordinator with default `top_k` and deadline.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        index: Arc<LiveIndex>,
        embedder: Arc<BulkheadEmbedder>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            top_k: DEFAULT_TOP_K,
            deadline: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets how many ANN candidates an image query keeps.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the per-query deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Runs a hybrid search.
    ///
    /// Results are the store's matching records, most recent first.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the deadline passes
    /// - [`Error::Busy`] if the embedding bulkhead rejects the image
    /// - [`Error::DimensionMismatch`] if the embedder and index disagree
    /// - [`Error::StoreUnavailable`] if the store query fails
    #[instrument(skip_all, fields(
        has_words = request.words.is_some(),
        has_class = request.class_filter.is_some(),
        has_image = request.image.is_some(),
    ))]
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<TrademarkSummary>> {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.deadline, self.execute(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation: "search".to_string(),
                elapsed_ms: elapsed_ms(start),
            }),
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::counter!("search_queries_total", "status" => status).increment(1);
        metrics::histogram!("search_duration_ms", "status" => status)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(rows) => tracing::debug!(results = rows.len(), "Search completed"),
            Err(e) => tracing::warn!(error = %e, "Search failed"),
        }
        result
    }

    /// Lists every record, most recent first.
    ///
    /// # Errors
    ///
    /// Same as [`search`](Self::search).
    pub async fn list_all(&self) -> Result<Vec<TrademarkSummary>> {
        self.search(SearchRequest::new()).await
    }

    /// Fetches the logo bytes for `id` under the query deadline.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the record does not exist or has no logo
    /// - [`Error::Timeout`] if the deadline passes
    pub async fn fetch_logo(&self, id: TrademarkId) -> Result<Vec<u8>> {
        let start = Instant::now();
        let store = Arc::clone(&self.store);
        let task = run_blocking("fetch_logo", move || store.fetch_logo(id));
        match tokio::time::timeout(self.deadline, task).await {
            Ok(logo) => logo?.ok_or_else(|| Error::NotFound(format!("logo for record {id}"))),
            Err(_) => Err(Error::Timeout {
                operation: "fetch_logo".to_string(),
                elapsed_ms: elapsed_ms(start),
            }),
        }
    }

    async fn execute(&self, request: SearchRequest) -> Result<Vec<TrademarkSummary>> {
        let mut filter = request.to_filter();

        if let Some(image) = request.image
            && let Some(candidates) = self.image_candidates(image).await?
        {
            filter = filter.with_allowlist(candidates);
        }

        let store = Arc::clone(&self.store);
        run_blocking("filtered_search", move || store.filtered_search(&filter)).await
    }

    /// Resolves an image into candidate ids.
    ///
    /// Returns `Ok(None)` when embedding fails and the image branch is
    /// skipped.
    async fn image_candidates(&self, image: Vec<u8>) -> Result<Option<BTreeSet<TrademarkId>>> {
        let vector = match self.embedder.embed(image).await {
            Ok(vector) => vector,
            Err(e @ (Error::Busy { .. } | Error::DimensionMismatch { .. })) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Image embedding failed, ignoring image criterion");
                metrics::counter!("search_image_branch_skipped_total", "reason" => e.kind())
                    .increment(1);
                return Ok(None);
            },
        };

        let snapshot = self.index.snapshot();
        match snapshot.search(&vector, self.top_k) {
            Ok(hits) => {
                tracing::debug!(
                    candidates = hits.len(),
                    top_score = hits.first().map(|h| h.score),
                    "Image candidates selected"
                );
                Ok(Some(hits.into_iter().map(|hit| hit.id).collect()))
            },
            Err(Error::InvalidInput(cause)) => {
                tracing::warn!(cause, "Image vector unusable, no logo candidates");
                metrics::counter!("search_image_unusable_vector_total").increment(1);
                Ok(Some(BTreeSet::new()))
            },
            Err(e) => Err(e),
        }
    }
}

/// Runs a store call on the blocking pool.
async fn run_blocking<T, F>(operation: &'static str, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("blocking task failed: {e}"),
        })?
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
