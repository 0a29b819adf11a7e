//! Engine wiring.
//!
//! A [`SearchEngine`] is built once per process and shared by `Arc`. It
//! owns the record store, the live index and the bulkhead-wrapped
//! embedder, and hands out the services that operate on them.

use super::{IndexBuilder, IngestService, QueryCoordinator, coordinator};
use crate::config::MarksearchConfig;
use crate::embedding::{
    BulkheadEmbedder, ClipEmbedder, DEFAULT_LOGO_DIMENSIONS, DEFAULT_TEXT_DIMENSIONS,
    EmbeddingBulkheadConfig, ImageEmbedder,
};
use crate::index::LiveIndex;
use crate::models::IndexStatus;
use crate::storage::{RecordStore, SqliteRecordStore};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Engine parameters that are fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Logo embedding dimensions; the embedder and stored vectors must agree.
    pub logo_dimensions: usize,
    /// Text embedding dimensions.
    pub text_dimensions: usize,
    /// ANN candidates per image query.
    pub top_k: usize,
    /// Per-query deadline.
    pub query_timeout: Duration,
    /// Embedding bulkhead settings.
    pub bulkhead: EmbeddingBulkheadConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            logo_dimensions: DEFAULT_LOGO_DIMENSIONS,
            text_dimensions: DEFAULT_TEXT_DIMENSIONS,
            top_k: coordinator::DEFAULT_TOP_K,
            query_timeout: coordinator::DEFAULT_QUERY_TIMEOUT,
            bulkhead: EmbeddingBulkheadConfig::default(),
        }
    }
}

impl From<&MarksearchConfig> for EngineSettings {
    fn from(config: &MarksearchConfig) -> Self {
        Self {
            logo_dimensions: config.logo_dimensions,
            text_dimensions: config.text_dimensions,
            top_k: config.top_k,
            query_timeout: config.query_timeout(),
            bulkhead: config.embedding.clone(),
        }
    }
}

/// Shared search engine state.
pub struct SearchEngine {
    store: Arc<dyn RecordStore>,
    index: Arc<LiveIndex>,
    builder: IndexBuilder,
    coordinator: QueryCoordinator,
    ingest: IngestService,
    settings: EngineSettings,
}

impl SearchEngine {
    /// Wires an engine around `store` and `embedder`.
    ///
    /// The index starts empty; call [`IndexBuilder::rebuild`] to load it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the embedder's output size
    /// differs from `settings.logo_dimensions`.
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Arc<dyn ImageEmbedder>,
        settings: EngineSettings,
    ) -> Result<Self> {
        if embedder.dimensions() != settings.logo_dimensions {
            return Err(Error::DimensionMismatch {
                expected: settings.logo_dimensions,
                actual: embedder.dimensions(),
            });
        }

        let index = Arc::new(LiveIndex::new(settings.logo_dimensions));
        let bulkhead = Arc::new(BulkheadEmbedder::new(
            Arc::clone(&embedder),
            settings.bulkhead.clone(),
        ));
        let builder = IndexBuilder::new(Arc::clone(&store), Arc::clone(&index));
        let coordinator = QueryCoordinator::new(Arc::clone(&store), Arc::clone(&index), bulkhead)
            .with_top_k(settings.top_k)
            .with_deadline(settings.query_timeout);
        let ingest = IngestService::new(
            Arc::clone(&store),
            embedder,
            settings.logo_dimensions,
            settings.text_dimensions,
        );

        Ok(Self {
            store,
            index,
            builder,
            coordinator,
            ingest,
            settings,
        })
    }

    /// Opens the `SQLite` store named by `config` and wires an engine with
    /// the CLIP embedder.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the database cannot
    /// be opened, or the embedder's dimensions disagree with the config.
    pub fn from_config(config: &MarksearchConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteRecordStore::open(config.database_path())?;
        tracing::info!(
            db_path = %config.database_path().display(),
            logo_dimensions = config.logo_dimensions,
            top_k = config.top_k,
            "Opening search engine"
        );
        Self::new(
            Arc::new(store),
            Arc::new(ClipEmbedder::new()),
            EngineSettings::from(config),
        )
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Returns the live index.
    #[must_use]
    pub const fn index(&self) -> &Arc<LiveIndex> {
        &self.index
    }

    /// Returns the index builder.
    #[must_use]
    pub const fn builder(&self) -> &IndexBuilder {
        &self.builder
    }

    /// Returns the query coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &QueryCoordinator {
        &self.coordinator
    }

    /// Returns the ingestion service.
    #[must_use]
    pub const fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the current index status.
    #[must_use]
    pub fn status(&self) -> IndexStatus {
        self.index.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::PixelFingerprintEmbedder;
    use crate::embedding::test_support::png;
    use crate::models::{IndexState, NewTrademark, SearchRequest};
    use crate::storage::InMemoryRecordStore;

    fn settings(dims: usize) -> EngineSettings {
        EngineSettings {
            logo_dimensions: dims,
            ..EngineSettings::default()
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = SearchEngine::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(PixelFingerprintEmbedder::with_dimensions(64)),
            settings(32),
        );
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 32,
                actual: 64
            })
        ));
    }

    #[tokio::test]
    async fn test_ingest_rebuild_search() {
        let engine = SearchEngine::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(PixelFingerprintEmbedder::with_dimensions(64)),
            settings(64),
        )
        .unwrap();
        assert_eq!(engine.status().state, IndexState::Empty);

        let logo = png(9, 16);
        let target = engine
            .ingest()
            .ingest(NewTrademark::new("S1").with_applicant("Acme").with_logo(logo.clone()))
            .unwrap()
            .id()
            .unwrap();
        engine
            .ingest()
            .ingest(NewTrademark::new("S2").with_applicant("Other"))
            .unwrap();

        engine.builder().rebuild_async().await.unwrap();
        let status = engine.status();
        assert_eq!(status.state, IndexState::Ready);
        assert_eq!(status.entries, 1);
        assert_eq!(status.excluded, 1);

        let hits = engine
            .coordinator()
            .search(SearchRequest::new().with_image(logo))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, target);
    }

    #[test]
    fn test_from_config_opens_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let config = MarksearchConfig::default().with_data_dir(dir.path());
        let engine = SearchEngine::from_config(&config).unwrap();
        assert_eq!(engine.store().count().unwrap(), 0);
        assert!(dir.path().join("marksearch.db").exists());
    }
}
