//! Record storage.
//!
//! The record store is the source of truth for trademark records, their
//! logos and their embeddings. The vector index is always rebuilt from it.
//!
//! - [`SqliteRecordStore`]: durable store backed by a single `SQLite` file
//! - [`InMemoryRecordStore`]: process-local store for tests and demos

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use traits::RecordStore;
