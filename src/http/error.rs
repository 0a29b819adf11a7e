//! Mapping of engine errors onto HTTP responses.

use crate::Error;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// An engine operation failed.
    Engine(Error),
    /// The multipart body could not be read.
    Multipart(MultipartError),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Engine(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e)
    }
}

/// Returns the status code for an engine error.
#[must_use]
pub const fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::StoreUnavailable { .. } | Error::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) | Error::Decode(_) => StatusCode::BAD_REQUEST,
        Error::DimensionMismatch { .. }
        | Error::OperationFailed { .. }
        | Error::FeatureNotEnabled(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Multipart(e) => {
                let status = e.status();
                let body = json!({ "error": "invalid_multipart", "message": e.body_text() });
                (status, Json(body)).into_response()
            },
            Self::Engine(e) => {
                let status = status_for(&e);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %e, "Request failed");
                    "internal server error".to_string()
                } else {
                    tracing::debug!(error = %e, status = status.as_u16(), "Request rejected");
                    e.to_string()
                };
                let body = json!({ "error": e.kind(), "message": message });
                let mut response = (status, Json(body)).into_response();
                if status == StatusCode::SERVICE_UNAVAILABLE {
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
                }
                response
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::Timeout { operation: "search".into(), elapsed_ms: 5 }, StatusCode::GATEWAY_TIMEOUT; "timeout")]
    #[test_case(Error::Busy { operation: "embed".into(), cause: "full".into() }, StatusCode::SERVICE_UNAVAILABLE; "busy")]
    #[test_case(Error::StoreUnavailable { operation: "open".into(), cause: "locked".into() }, StatusCode::SERVICE_UNAVAILABLE; "store")]
    #[test_case(Error::NotFound("logo 3".into()), StatusCode::NOT_FOUND; "not found")]
    #[test_case(Error::InvalidInput("bad".into()), StatusCode::BAD_REQUEST; "invalid")]
    #[test_case(Error::DimensionMismatch { expected: 2, actual: 3 }, StatusCode::INTERNAL_SERVER_ERROR; "dimension")]
    fn test_status_mapping(error: Error, expected: StatusCode) {
        assert_eq!(status_for(&error), expected);
    }

    #[test]
    fn test_unavailable_sets_retry_after() {
        let response = ApiError::from(Error::Busy {
            operation: "embed".into(),
            cause: "full".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
