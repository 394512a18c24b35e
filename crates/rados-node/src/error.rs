//! The HTTP-facing error type: the core's [`RadosError`] taxonomy plus the small
//! set of request-layer failures (bad multipart bodies, missing form fields, bad
//! bearer tokens) that belong to the HTTP boundary rather than the storage engine.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rados_core::RadosError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub enum ApiError {
    Core(RadosError),
    BadRequest(String),
    Unauthorized(String),
}

impl From<RadosError> for ApiError {
    fn from(err: RadosError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Core(err) => (
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.code(),
                err.to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
        };

        if status.is_server_error() {
            tracing::error!(%status, code, %message, "request failed");
        }

        (status, Json(ErrorBody { error: code, message })).into_response()
    }
}
