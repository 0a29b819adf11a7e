//! Index rebuild service.
//!
//! Reads every logo embedding from the record store, builds a fresh
//! [`IndexSnapshot`] off to the side and installs it in the [`LiveIndex`]
//! in one step. At most one rebuild runs at a time; a request that arrives
//! while one is running is coalesced into it.

use crate::index::{IndexSnapshot, LiveIndex};
use crate::storage::RecordStore;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::instrument;

/// Result of a rebuild request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    /// A new snapshot was installed.
    Installed {
        /// Searchable entries in the new snapshot.
        entries: usize,
        /// Records skipped for lacking a usable embedding.
        excluded: usize,
        /// Generation number of the new snapshot.
        generation: u64,
        /// Wall time of the rebuild.
        elapsed_ms: u64,
    },
    /// Another rebuild was already running; this request was folded into it.
    AlreadyRunning,
}

/// Builds and installs index snapshots from the record store.
#[derive(Clone)]
pub struct IndexBuilder {
    store: Arc<dyn RecordStore>,
    index: Arc<LiveIndex>,
}

impl IndexBuilder {
    /// Creates a builder over `store` that installs into `index`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, index: Arc<LiveIndex>) -> Self {
        Self { store, index }
    }

    /// Rebuilds the index from the current store contents.
    ///
    /// Blocking; call from a blocking context or via
    /// [`tokio::task::spawn_blocking`].
    ///
    /// On failure the previously installed snapshot stays in service and the
    /// error is recorded in the index status.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreUnavailable`] if the embeddings cannot be read
    /// - [`Error::DimensionMismatch`] if a stored embedding has the wrong length
    #[instrument(skip(self))]
    pub fn rebuild(&self) -> Result<RebuildOutcome> {
        let Some(_guard) = self.index.begin_build() else {
            tracing::info!("Index rebuild already running, coalescing request");
            metrics::counter!("index_rebuilds_total", "status" => "coalesced").increment(1);
            return Ok(RebuildOutcome::AlreadyRunning);
        };

        let start = Instant::now();
        match self.build_snapshot() {
            Ok(snapshot) => {
                let entries = snapshot.len();
                let excluded = snapshot.excluded();
                let generation = self.index.install(snapshot);
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                metrics::counter!("index_rebuilds_total", "status" => "success").increment(1);
                metrics::histogram!("index_rebuild_duration_ms")
                    .record(start.elapsed().as_secs_f64() * 1000.0);
                tracing::info!(entries, excluded, generation, elapsed_ms, "Index rebuilt");

                Ok(RebuildOutcome::Installed {
                    entries,
                    excluded,
                    generation,
                    elapsed_ms,
                })
            },
            Err(e) => {
                metrics::counter!("index_rebuilds_total", "status" => "error").increment(1);
                tracing::error!(error = %e, "Index rebuild failed, keeping previous snapshot");
                self.index.record_failure(&e);
                Err(e)
            },
        }
    }

    fn build_snapshot(&self) -> Result<IndexSnapshot> {
        let rows = self.store.fetch_all_embeddings()?;
        IndexSnapshot::build(self.index.dimensions(), rows)
    }

    /// Runs [`rebuild`](Self::rebuild) on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the rebuild error, or [`Error::OperationFailed`] if the
    /// blocking task panics.
    pub async fn rebuild_async(&self) -> Result<RebuildOutcome> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.rebuild())
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "index_rebuild".to_string(),
                cause: format!("rebuild task failed: {e}"),
            })?
    }

    /// Spawns a task that rebuilds every `interval`.
    ///
    /// The first rebuild happens one interval after spawning. Failures are
    /// logged and the loop keeps going.
    #[must_use]
    pub fn spawn_periodic(&self, interval: Duration) -> JoinHandle<()> {
        let builder = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = builder.rebuild_async().await {
                    tracing::warn!(error = %e, "Periodic index rebuild failed");
                }
            }
        })
    }
}
