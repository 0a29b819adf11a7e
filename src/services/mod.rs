//! Business logic services.
//!
//! Services orchestrate the record store, the embedder and the live index
//! and provide the high-level operations.

mod builder;
mod coordinator;
mod engine;
mod ingest;

pub use builder::{IndexBuilder, RebuildOutcome};
pub use coordinator::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TOP_K, QueryCoordinator};
pub use engine::{EngineSettings, SearchEngine};
pub use ingest::{IngestReport, IngestService};
