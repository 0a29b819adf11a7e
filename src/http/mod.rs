//! HTTP interface.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/api/combined_search` | Hybrid search (multipart `words`, `class_filter`, `image`) |
//! | `GET` | `/api/trademarks` | All records, newest first |
//! | `GET` | `/logo/{id}` | Stored logo bytes |
//! | `POST` | `/admin/index/rebuild` | Rebuild the vector index |
//! | `GET` | `/admin/index/status` | Index state and size |
//! | `GET` | `/health` | Liveness |

mod error;
mod handlers;

pub use error::{ApiError, status_for};

use crate::config::HttpSettings;
use crate::services::SearchEngine;
use crate::{Error, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header;
use axum::routing::{get, post};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
pub type AppState = Arc<SearchEngine>;

/// Builds the application router.
///
/// Request bodies larger than `max_upload_bytes` are rejected with 413.
pub fn router(engine: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/combined_search", post(handlers::combined_search))
        .route("/api/trademarks", get(handlers::list_trademarks))
        .route("/logo/{id}", get(handlers::logo))
        .route("/admin/index/rebuild", post(handlers::rebuild_index))
        .route("/admin/index/status", get(handlers::index_status))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            header::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Serves the router until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve_with_shutdown(
    engine: AppState,
    settings: &HttpSettings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })?;
    let local: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?local, "Serving HTTP");

    axum::serve(listener, router(engine, settings.max_upload_bytes))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}

/// Serves the router until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(engine: AppState, settings: &HttpSettings) -> Result<()> {
    serve_with_shutdown(engine, settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    })
    .await
}
