//! Request handlers.

use super::AppState;
use super::error::ApiError;
use crate::embedding::sniff_mime_type;
use crate::models::{IndexStatus, SearchRequest, TrademarkId, TrademarkSummary};
use crate::services::RebuildOutcome;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// `POST /api/combined_search`
///
/// Multipart form with optional `words`, `class_filter` and `image` fields.
/// Blank fields count as absent; unknown fields are ignored.
pub async fn combined_search(
    State(engine): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<TrademarkSummary>>, ApiError> {
    let mut request = SearchRequest::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "words" => {
                let words = field.text().await?;
                if !words.trim().is_empty() {
                    request = request.with_words(words);
                }
            },
            "class_filter" => {
                let class_filter = field.text().await?;
                if !class_filter.trim().is_empty() {
                    request = request.with_class_filter(class_filter);
                }
            },
            "image" => {
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    request = request.with_image(bytes.to_vec());
                }
            },
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let results = engine.coordinator().search(request).await?;
    Ok(Json(results))
}

/// `GET /api/trademarks`
pub async fn list_trademarks(
    State(engine): State<AppState>,
) -> Result<Json<Vec<TrademarkSummary>>, ApiError> {
    Ok(Json(engine.coordinator().list_all().await?))
}

/// `GET /logo/{id}`
pub async fn logo(
    State(engine): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let bytes = engine.coordinator().fetch_logo(TrademarkId::new(id)).await?;
    let content_type = sniff_mime_type(&bytes).unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// `POST /admin/index/rebuild`
///
/// Answers 409 when a rebuild is already running.
pub async fn rebuild_index(State(engine): State<AppState>) -> Result<Response, ApiError> {
    let outcome = engine.builder().rebuild_async().await?;
    let status = match outcome {
        RebuildOutcome::Installed { .. } => StatusCode::OK,
        RebuildOutcome::AlreadyRunning => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)).into_response())
}

/// `GET /admin/index/status`
pub async fn index_status(State(engine): State<AppState>) -> Json<IndexStatus> {
    Json(engine.status())
}

/// `GET /health`
pub async fn health(State(engine): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "index": engine.status().state,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
