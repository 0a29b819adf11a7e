//! Serve command handler.

use marksearch::MarksearchConfig;

/// Serve command.
///
/// Rebuilds the index (unless disabled), starts the periodic rebuild task
/// when configured, and serves HTTP until Ctrl-C.
#[cfg(feature = "http")]
pub async fn cmd_serve(config: MarksearchConfig) -> anyhow::Result<()> {
    let engine = super::open_engine(&config)?;

    if config.rebuild_on_start {
        // A failed startup rebuild leaves the index empty; text search still works
        if let Err(e) = engine.builder().rebuild_async().await {
            tracing::error!(error = %e, "Startup index rebuild failed");
        }
    }

    let periodic = config
        .rebuild_interval()
        .map(|interval| engine.builder().spawn_periodic(interval));

    let result = marksearch::http::serve(engine, &config.http).await;

    if let Some(handle) = periodic {
        handle.abort();
    }
    result?;
    tracing::info!("Server stopped");
    Ok(())
}

/// Serve command (feature not enabled).
#[cfg(not(feature = "http"))]
pub async fn cmd_serve(_config: MarksearchConfig) -> anyhow::Result<()> {
    Err(marksearch::Error::FeatureNotEnabled("http".to_string()).into())
}
