//! Bulkhead pattern implementation for embedding operations.
//!
//! Provides concurrency limiting so a burst of image queries cannot exhaust
//! CPU or memory on model inference. A semaphore bounds the number of
//! embeddings in flight; callers beyond the bound either wait (up to a
//! timeout) or are rejected immediately.
//!
//! # Usage
//!
//! ```rust,ignore
//! use marksearch::embedding::{BulkheadEmbedder, ClipEmbedder, EmbeddingBulkheadConfig};
//!
//! let bulkhead = BulkheadEmbedder::new(Arc::new(ClipEmbedder::new()), EmbeddingBulkheadConfig::default());
//! let embedding = bulkhead.embed(logo_bytes).await?;
//! ```

use super::ImageEmbedder;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Upper bound on permit waits when the configured timeout is zero.
const MAX_ACQUIRE_WAIT: Duration = Duration::from_secs(120);

/// Configuration for the embedding bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingBulkheadConfig {
    /// Maximum concurrent embedding operations allowed.
    ///
    /// Default: 2 (model inference is CPU and memory heavy).
    pub max_concurrent: usize,

    /// Timeout for acquiring a permit in milliseconds (0 = two minute cap).
    ///
    /// Default: 5000ms.
    pub acquire_timeout_ms: u64,

    /// Whether to fail fast when the bulkhead is full instead of waiting.
    ///
    /// Default: false.
    pub fail_fast: bool,
}

impl Default for EmbeddingBulkheadConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingBulkheadConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: 2,
            acquire_timeout_ms: 5_000,
            fail_fast: false,
        }
    }

    /// Applies overrides from a variable lookup.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `MARKSEARCH_EMBEDDING_MAX_CONCURRENT` | Max concurrent ops | 2 |
    /// | `MARKSEARCH_EMBEDDING_ACQUIRE_TIMEOUT_MS` | Permit timeout | 5000 |
    /// | `MARKSEARCH_EMBEDDING_FAIL_FAST` | Fail when full | false |
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("MARKSEARCH_EMBEDDING_MAX_CONCURRENT")
            && let Ok(parsed) = v.parse::<usize>()
        {
            self.max_concurrent = parsed.max(1);
        }
        if let Some(v) = lookup("MARKSEARCH_EMBEDDING_ACQUIRE_TIMEOUT_MS")
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.acquire_timeout_ms = parsed;
        }
        if let Some(v) = lookup("MARKSEARCH_EMBEDDING_FAIL_FAST") {
            self.fail_fast = v.eq_ignore_ascii_case("true") || v == "1";
        }
        self
    }

    /// Sets the maximum concurrent operations.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the acquire timeout in milliseconds.
    #[must_use]
    pub const fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Sets whether to fail fast when the bulkhead is full.
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    fn acquire_timeout(&self) -> Duration {
        if self.acquire_timeout_ms == 0 {
            MAX_ACQUIRE_WAIT
        } else {
            Duration::from_millis(self.acquire_timeout_ms)
        }
    }
}

/// Async embedder wrapper with bulkhead concurrency limiting.
///
/// Each embedding runs on tokio's blocking pool. The permit travels with the
/// blocking task, so a caller that gives up (for example on a query
/// deadline) does not free the slot until the computation has actually
/// finished.
pub struct BulkheadEmbedder {
    inner: Arc<dyn ImageEmbedder>,
    config: EmbeddingBulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl BulkheadEmbedder {
    /// Creates a new bulkhead-wrapped embedder.
    #[must_use]
    pub fn new(inner: Arc<dyn ImageEmbedder>, config: EmbeddingBulkheadConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            inner,
            config,
            semaphore,
        }
    }

    /// Returns the wrapped embedder's dimensions.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    /// Returns the current number of available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the wrapped embedder.
    #[must_use]
    pub fn inner(&self) -> Arc<dyn ImageEmbedder> {
        Arc::clone(&self.inner)
    }

    /// Embeds an image under bulkhead protection.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if no permit is available (fail-fast) or the wait
    ///   for one times out
    /// - [`Error::DimensionMismatch`] if the model returns a vector of the
    ///   wrong length
    /// - Any error from the wrapped embedder
    pub async fn embed(&self, image: Vec<u8>) -> Result<Vec<f32>> {
        let permit = self.acquire_permit().await?;
        tracing::trace!("Acquired embedding bulkhead permit");

        let inner = Arc::clone(&self.inner);
        let expected = inner.dimensions();
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            inner.embed(&image)
        })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "embed_image".to_string(),
            cause: format!("embedding task failed: {e}"),
        })?;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::histogram!("embedding_duration_ms", "status" => status)
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::trace!(success = result.is_ok(), "Released embedding bulkhead permit");

        let vector = result?;
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Acquires a permit, respecting the configured timeout and fail-fast settings.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let available = self.semaphore.available_permits();
        metrics::gauge!("embedding_bulkhead_available_permits").set(available as f64);

        if self.config.fail_fast {
            return self.acquire_permit_fail_fast(available);
        }

        self.acquire_permit_with_timeout().await
    }

    /// Fast-fail acquisition that returns an error immediately if the bulkhead is full.
    fn acquire_permit_fail_fast(&self, available: usize) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore).try_acquire_owned().map_or_else(
            |_| {
                metrics::counter!("embedding_bulkhead_rejections_total", "reason" => "full")
                    .increment(1);
                Err(Error::Busy {
                    operation: "embedding_bulkhead_acquire".to_string(),
                    cause: format!(
                        "embedding bulkhead full: {} concurrent operations (max: {})",
                        self.config.max_concurrent.max(1) - available,
                        self.config.max_concurrent.max(1)
                    ),
                })
            },
            |permit| {
                metrics::counter!("embedding_bulkhead_permits_acquired_total").increment(1);
                Ok(permit)
            },
        )
    }

    /// Acquisition that waits for a permit up to the configured timeout.
    async fn acquire_permit_with_timeout(&self) -> Result<OwnedSemaphorePermit> {
        let timeout = self.config.acquire_timeout();
        match tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => {
                metrics::counter!("embedding_bulkhead_permits_acquired_total").increment(1);
                Ok(permit)
            },
            Ok(Err(closed)) => Err(Error::OperationFailed {
                operation: "embedding_bulkhead_acquire".to_string(),
                cause: closed.to_string(),
            }),
            Err(_) => {
                metrics::counter!("embedding_bulkhead_rejections_total", "reason" => "timeout")
                    .increment(1);
                Err(Error::Busy {
                    operation: "embedding_bulkhead_acquire".to_string(),
                    cause: format!(
                        "embedding bulkhead acquire timed out after {}ms",
                        timeout.as_millis()
                    ),
                })
            },
        }
    }
}
