//! Command handlers module.
//!
//! - `serve.rs`: HTTP server with startup and periodic index rebuilds
//! - `search.rs`: Search and logo retrieval
//! - `index.rs`: Ingestion, rebuild and status
//! - `config.rs`: Configuration display

mod config;
mod index;
mod search;
mod serve;

use anyhow::Context;
use clap::ValueEnum;
use marksearch::{MarksearchConfig, SearchEngine};
use std::sync::Arc;

pub use config::cmd_config;
pub use index::{cmd_ingest, cmd_rebuild, cmd_status};
pub use search::{cmd_logo, cmd_search};
pub use serve::cmd_serve;

/// Result output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns.
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Opens the engine described by `config`.
fn open_engine(config: &MarksearchConfig) -> anyhow::Result<Arc<SearchEngine>> {
    let engine = SearchEngine::from_config(config).with_context(|| {
        format!(
            "failed to open search engine at {}",
            config.database_path().display()
        )
    })?;
    Ok(Arc::new(engine))
}
