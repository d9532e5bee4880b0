//! Uniform JSON envelopes for API responses.
//!
//! Successful responses are wrapped as `{statusCode, data, message, success}`
//! and errors as `{statusCode, message, errors}`. Application error types derive
//! [`HttpError`](crate::HttpError) and render through [`error_response`].

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

/// Maps an error onto the HTTP error envelope.
///
/// Usually derived with `#[derive(shopkit::HttpError)]`.
pub trait HttpError: std::error::Error {
    fn http_code(&self) -> StatusCode;

    /// User-facing message. Must not leak internal details for server errors.
    fn http_message(&self) -> String;

    /// Optional list of detail messages (e.g. per-field validation failures).
    fn http_details(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub message: String,
    pub errors: Vec<String>,
}

impl ErrorEnvelope {
    pub fn from_error<E: HttpError + ?Sized>(err: &E) -> Self {
        ErrorEnvelope {
            status_code: err.http_code().as_u16(),
            message: err.http_message(),
            errors: err.http_details(),
        }
    }
}

/// Render an [`HttpError`] as a response. Server errors are logged with their
/// internal `Display` since the body only carries the public message.
pub fn error_response<E: HttpError + ?Sized>(err: &E) -> Response {
    let code = err.http_code();
    if code.is_server_error() {
        tracing::error!(status = code.as_u16(), error = %err, "request failed");
    } else {
        tracing::debug!(status = code.as_u16(), error = %err, "request rejected");
    }
    (code, Json(ErrorEnvelope::from_error(err))).into_response()
}

/// Success envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        ApiResponse {
            status_code: status.as_u16(),
            data,
            message: message.into(),
            success: status.as_u16() < 400,
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, data, message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
