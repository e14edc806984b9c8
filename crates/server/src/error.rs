//! Request-boundary errors for the mirage server.
//!
//! Every handler returns [`ApiResult`]; failures are rendered as a
//! `{ "error": <message> }` body with the status the error maps to.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mirage_core::Error;
use serde::Serialize;

/// A pipeline error on its way out of a handler.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), status = status.as_u16(), "{}", self.0);
        } else {
            tracing::warn!(kind = self.0.kind(), status = status.as_u16(), "{}", self.0);
        }

        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
