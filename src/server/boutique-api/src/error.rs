//! Generic API errors.
//!
//! Everything outside the authentication pipeline fails with an
//! [`ApiError`]. It renders the same JSON body as authentication failures;
//! the request path is filled in by [`render_errors`].

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use boutique_auth::{AuthError, ErrorBody};
use boutique_crypto::CryptoError;
use boutique_storage::StorageError;
use thiserror::Error;
use tracing::error;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is malformed or fails validation.
    #[error("{0}")]
    BadRequest(String),

    /// Login failed. Unknown user and wrong password look the same.
    #[error("bad credentials")]
    BadCredentials,

    /// The caller may not perform this operation.
    #[error("{0}")]
    Forbidden(String),

    /// The resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    /// Authentication or authorization failure raised inside a handler.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Unexpected failure. The detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::BadCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Auth(err) => err.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message.
    pub fn message(&self) -> String {
        match self {
            ApiError::Auth(err) => err.message().to_string(),
            ApiError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("record encoding: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Status and message of an error whose path is not known yet.
#[derive(Debug, Clone)]
struct PendingError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            error!(error = %detail, "Request failed");
        }

        let status = self.status();
        let message = self.message();

        let mut response = ErrorBody::new("", message.clone(), status).into_response();
        response
            .extensions_mut()
            .insert(PendingError { status, message });
        response
    }
}

/// Fills the request path into error bodies produced by [`ApiError`].
pub async fn render_errors(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let mut response = next.run(req).await;

    match response.extensions_mut().remove::<PendingError>() {
        Some(pending) => ErrorBody::new(path, pending.message, pending.status).into_response(),
        None => response,
    }
}
