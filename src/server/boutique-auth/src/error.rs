//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::principal::Role;
use crate::token::TokenError;

/// Every way a request can fail authentication or authorization.
///
/// Lower-level failures (token decoding, principal lookup, timeouts) are
/// classified into one of these kinds before they leave the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Token is authentic but past its expiry.
    #[error("token expired")]
    Expired,

    /// Bad signature, undecodable token, unknown subject or subject
    /// mismatch. Deliberately a single kind.
    #[error("invalid token")]
    Malformed,

    /// No identity on a route that requires one.
    #[error("authentication required (credential presented: {credential_presented})")]
    Unauthenticated {
        /// Whether the request carried an `Authorization` header at all.
        credential_presented: bool,
    },

    /// Authenticated, but the principal's role does not match.
    #[error("access denied: {required} role required")]
    Forbidden {
        /// Role the route requires.
        required: Role,
    },
}

impl AuthError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Expired | AuthError::Malformed => StatusCode::UNAUTHORIZED,
            AuthError::Unauthenticated {
                credential_presented: false,
            } => StatusCode::UNAUTHORIZED,
            AuthError::Unauthenticated {
                credential_presented: true,
            } => StatusCode::FORBIDDEN,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        }
    }

    /// User-facing message. Never carries internal detail.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::Expired => "token expired",
            AuthError::Malformed => "invalid token",
            AuthError::Unauthenticated {
                credential_presented: false,
            } => "full authentication is required to access this resource",
            AuthError::Unauthenticated {
                credential_presented: true,
            } => "insufficient authentication",
            AuthError::Forbidden { .. } => "access denied",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Expired,
            TokenError::Malformed => AuthError::Malformed,
        }
    }
}
