//! Failure responder.
//!
//! Turns an [`AuthError`] into the JSON error response shared by the whole
//! API: `{"path", "message", "status", "timestamp"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Structured error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Request path that failed.
    pub path: String,
    /// Human-readable message.
    pub message: String,
    /// Numeric HTTP status, repeated in the body.
    pub status: u16,
    /// When the error was produced (RFC 3339).
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    /// Creates a body stamped with the current time.
    pub fn new(path: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            status: status.as_u16(),
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Builds the response for an authentication or authorization failure.
///
/// The caller must return this response as-is: nothing else runs for the
/// request afterwards.
pub fn respond(path: &str, error: &AuthError) -> Response {
    ErrorBody::new(path, error.message(), error.status()).into_response()
}
