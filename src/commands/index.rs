//! Ingest, rebuild and status command handlers.

use super::open_engine;
use anyhow::Context;
use marksearch::{MarksearchConfig, RebuildOutcome};
use std::path::PathBuf;

/// Ingest command.
pub async fn cmd_ingest(config: &MarksearchConfig, manifest: PathBuf) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let ingest = engine.ingest().clone();
    let path = manifest.clone();
    let report = tokio::task::spawn_blocking(move || ingest.ingest_csv(&path))
        .await
        .context("ingest task failed")?
        .with_context(|| format!("failed to ingest {}", manifest.display()))?;

    println!("Ingested {}", manifest.display());
    println!("  Inserted:        {}", report.inserted);
    println!("  Duplicates:      {}", report.duplicates);
    println!("  Failed:          {}", report.failed);
    println!("  Logos embedded:  {}", report.embedded_logos);
    if report.failed > 0 {
        println!();
        println!("Some rows were skipped; run with --verbose for details.");
    }
    Ok(())
}

/// Rebuild command.
///
/// Builds an index from the store in this process and reports what it
/// contains. A running server keeps its own index; use
/// `POST /admin/index/rebuild` to refresh it.
pub async fn cmd_rebuild(config: &MarksearchConfig) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    match engine.builder().rebuild_async().await? {
        RebuildOutcome::Installed {
            entries,
            excluded,
            elapsed_ms,
            ..
        } => {
            println!("Index built in {elapsed_ms}ms");
            println!("  Searchable logos: {entries}");
            println!("  Excluded records: {excluded}");
        },
        RebuildOutcome::AlreadyRunning => println!("A rebuild is already running."),
    }
    Ok(())
}

/// Status command.
pub async fn cmd_status(config: &MarksearchConfig) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let store = std::sync::Arc::clone(engine.store());
    let records = tokio::task::spawn_blocking(move || store.count())
        .await
        .context("status task failed")??;
    engine.builder().rebuild_async().await?;
    let status = engine.status();

    println!("Marksearch Status");
    println!("=================");
    println!();
    println!("Database:          {}", config.database_path().display());
    println!("Records:           {records}");
    println!("Index state:       {}", status.state.as_str());
    println!("Searchable logos:  {}", status.entries);
    println!("Excluded records:  {}", status.excluded);
    println!("Dimensions:        {}", status.dimensions);
    Ok(())
}
