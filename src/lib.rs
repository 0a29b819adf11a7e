//! # Marksearch
//!
//! Hybrid search over trademark records.
//!
//! A query combines three optional criteria: free-text words matched against
//! descriptions and applicant names, a single class code, and a logo image.
//! The image is embedded into a fixed-dimension vector and looked up in an
//! in-memory nearest-neighbour index; the top candidates restrict the
//! relational filter that answers the query.
//!
//! ## Features
//!
//! - `SQLite` record store with unique serial numbers and stable ids
//! - Immutable index snapshots swapped atomically on rebuild
//! - Bounded embedding concurrency with graceful image-branch degradation
//! - Per-query deadlines
//! - Optional HNSW (`usearch-hnsw`) and CLIP (`fastembed-embeddings`) backends
//!
//! ## Example
//!
//! ```rust,ignore
//! use marksearch::{MarksearchConfig, SearchEngine, SearchRequest};
//!
//! let engine = SearchEngine::from_config(&MarksearchConfig::load_default())?;
//! engine.builder().rebuild()?;
//! let hits = engine
//!     .coordinator()
//!     .search(SearchRequest::new().with_words("acme").with_class_filter("9"))
//!     .await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Current duplicates: fastembed→ort and image codec transitive deps.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod embedding;
#[cfg(feature = "http")]
pub mod http;
pub mod index;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::MarksearchConfig;
pub use embedding::{BulkheadEmbedder, ClipEmbedder, EmbeddingBulkheadConfig, ImageEmbedder};
pub use index::{IndexSnapshot, LiveIndex, ScoredId};
pub use models::{
    ClassCodes, IndexState, IndexStatus, InsertOutcome, NewTrademark, RecordFilter,
    SearchRequest, TrademarkId, TrademarkRecord, TrademarkSummary,
};
pub use services::{
    EngineSettings, IndexBuilder, IngestReport, IngestService, QueryCoordinator, RebuildOutcome,
    SearchEngine,
};
pub use storage::{InMemoryRecordStore, RecordStore, SqliteRecordStore};

/// Error type for marksearch operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty serial numbers, malformed manifests, bad configuration values |
/// | `Decode` | Image bytes are empty, truncated or in an unsupported format |
/// | `StoreUnavailable` | The record store cannot be opened or a query against it fails |
/// | `Timeout` | A query exceeds its deadline, an embedding permit wait expires |
/// | `Busy` | The embedding bulkhead is full and fail-fast is configured |
/// | `DimensionMismatch` | A vector's length disagrees with the configured dimensionality |
/// | `OperationFailed` | Embedding model failures, I/O errors, task join failures |
/// | `NotFound` | A logo or record lookup targets an unknown id |
/// | `FeatureNotEnabled` | Using features requiring compile-time flags |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A record has an empty serial number
    /// - A manifest row cannot be parsed
    /// - Configuration values are out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Image bytes could not be decoded.
    ///
    /// The query path treats this as a degraded image branch rather than a
    /// failed query.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// The record store could not serve a request.
    ///
    /// Raised when:
    /// - The `SQLite` database cannot be opened or initialized
    /// - A statement fails to prepare or execute
    #[error("record store unavailable during '{operation}': {cause}")]
    StoreUnavailable {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation exceeded its deadline.
    #[error("'{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Milliseconds elapsed before giving up.
        elapsed_ms: u64,
    },

    /// A bounded resource rejected the request.
    ///
    /// Raised when the embedding bulkhead is full and configured to fail fast.
    #[error("'{operation}' rejected: {cause}")]
    Busy {
        /// The operation that was rejected.
        operation: String,
        /// Why the request was rejected.
        cause: String,
    },

    /// A vector had the wrong number of dimensions.
    ///
    /// This is a configuration error: the embedder, the stored embeddings and
    /// the index must all agree on dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimensionality.
        expected: usize,
        /// Observed dimensionality.
        actual: usize,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - The embedding model fails to load or panics
    /// - Filesystem I/O errors occur
    /// - A blocking task cannot be joined
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Returns true if retrying the same request later may succeed.
    ///
    /// Store outages, deadlines and a saturated bulkhead are transient;
    /// everything else is a property of the request or the configuration.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::Timeout { .. } | Self::Busy { .. }
        )
    }

    /// Returns the short machine-readable kind of this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Decode(_) => "decode",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::Busy { .. } => "busy",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::OperationFailed { .. } => "operation_failed",
            Self::NotFound(_) => "not_found",
            Self::FeatureNotEnabled(_) => "feature_not_enabled",
        }
    }
}

/// Result type alias for marksearch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Uses `SystemTime::now()` with fallback to 0 if the system clock is before
/// the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use marksearch::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::DimensionMismatch {
            expected: 512,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: expected 512, got 384"
        );

        let err = Error::Timeout {
            operation: "search".to_string(),
            elapsed_ms: 10,
        };
        assert_eq!(err.to_string(), "'search' timed out after 10ms");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            Error::StoreUnavailable {
                operation: "open".to_string(),
                cause: "locked".to_string(),
            }
            .is_retryable()
        );
        assert!(
            Error::Busy {
                operation: "embed".to_string(),
                cause: "full".to_string(),
            }
            .is_retryable()
        );
        assert!(!Error::Decode("bad header".to_string()).is_retryable());
        assert!(
            !Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
            .is_retryable()
        );
        assert!(!Error::NotFound("logo 7".to_string()).is_retryable());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Decode(String::new()).kind(), "decode");
        assert_eq!(Error::NotFound(String::new()).kind(), "not_found");
    }
}
