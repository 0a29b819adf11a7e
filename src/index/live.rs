//! The live index: the installed snapshot plus rebuild state.

use super::IndexSnapshot;
use crate::models::{IndexState, IndexStatus};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Holds the currently installed [`IndexSnapshot`].
///
/// Readers clone an `Arc` to the current snapshot and search it without
/// holding any lock, so an in-flight query keeps using the snapshot it
/// started with even if a rebuild installs a new one. Installation replaces
/// the pointer under a short write lock.
#[derive(Debug)]
pub struct LiveIndex {
    dimensions: usize,
    current: RwLock<Arc<IndexSnapshot>>,
    building: AtomicBool,
    generation: AtomicU64,
    last_error: RwLock<Option<String>>,
}

/// Marks a rebuild in progress. Dropping it clears the flag.
#[derive(Debug)]
pub struct BuildGuard<'a> {
    building: &'a AtomicBool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.building.store(false, Ordering::Release);
    }
}

impl LiveIndex {
    /// Creates a live index holding an empty snapshot.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            current: RwLock::new(Arc::new(IndexSnapshot::empty(dimensions))),
            building: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    /// Configured vector dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns the installed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&read_lock(&self.current))
    }

    /// Claims the single rebuild slot.
    ///
    /// Returns `None` if another rebuild holds it.
    #[must_use]
    pub fn begin_build(&self) -> Option<BuildGuard<'_>> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BuildGuard {
                building: &self.building,
            })
    }

    /// Returns true while a rebuild is running.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    /// Installs a new snapshot and returns the generation number it got.
    pub fn install(&self, snapshot: IndexSnapshot) -> u64 {
        let entries = snapshot.len();
        {
            let mut current = write_lock(&self.current);
            *current = Arc::new(snapshot);
        }
        *write_lock(&self.last_error) = None;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        metrics::gauge!("index_entries").set(entries as f64);
        metrics::counter!("index_snapshots_installed_total").increment(1);
        tracing::info!(entries, generation, "Installed index snapshot");
        generation
    }

    /// Records a failed rebuild. The installed snapshot is left untouched.
    pub fn record_failure(&self, error: &crate::Error) {
        *write_lock(&self.last_error) = Some(error.to_string());
        metrics::counter!("index_rebuild_failures_total", "kind" => error.kind()).increment(1);
    }

    /// Reports the current state.
    ///
    /// `Building` takes precedence while a rebuild runs; otherwise the state
    /// follows whether the installed snapshot has any entries.
    #[must_use]
    pub fn status(&self) -> IndexStatus {
        let snapshot = self.snapshot();
        let state = if self.is_building() {
            IndexState::Building
        } else if snapshot.is_empty() {
            IndexState::Empty
        } else {
            IndexState::Ready
        };
        IndexStatus {
            state,
            entries: snapshot.len(),
            excluded: snapshot.excluded(),
            dimensions: self.dimensions,
            generation: self.generation.load(Ordering::Acquire),
            built_at: snapshot.built_at(),
            last_error: read_lock(&self.last_error).clone(),
        }
    }
}

/// Acquires a read lock, recovering from poison.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Index lock was poisoned, recovering");
        metrics::counter!("index_lock_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}

/// Acquires a write lock, recovering from poison.
fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Index lock was poisoned, recovering");
        metrics::counter!("index_lock_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}
