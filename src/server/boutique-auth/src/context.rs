//! Request identity context.
//!
//! The gate stores an [`Identity`] in the request's extensions after a
//! successful authentication. It lives exactly as long as the request.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use crate::principal::{Principal, Role};
use crate::responder::respond;

/// Authenticated identity attached to a request.
#[derive(Debug, Clone)]
pub struct Identity {
    principal: Arc<Principal>,
}

impl Identity {
    /// Wraps a resolved principal.
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Arc::new(principal),
        }
    }

    /// The resolved principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// The principal's identifier (token subject).
    pub fn subject(&self) -> &str {
        &self.principal.identifier
    }

    /// The principal's role.
    pub fn role(&self) -> Role {
        self.principal.role
    }

    /// Returns `true` if the principal holds exactly `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.principal.role == role
    }

    /// Fails with [`AuthError::Forbidden`] unless the principal holds `role`.
    pub fn require_role(&self, role: Role) -> Result<(), AuthError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden { required: role })
        }
    }
}

/// Marker left by the gate when the request carried an `Authorization`
/// header that was not a usable bearer credential.
#[derive(Debug, Clone, Copy)]
pub struct CredentialPresented;

/// Rejection produced by the [`Identity`] extractor.
#[derive(Debug)]
pub struct AuthRejection {
    path: String,
    error: AuthError,
}

impl AuthRejection {
    /// Creates a rejection for the given request path.
    pub fn new(path: impl Into<String>, error: AuthError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// The underlying error.
    pub fn error(&self) -> AuthError {
        self.error
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        respond(&self.path, &self.error)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            AuthRejection::new(
                parts.uri.path(),
                AuthError::Unauthenticated {
                    credential_presented: parts.extensions.get::<CredentialPresented>().is_some(),
                },
            )
        })
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn identity(role: Role) -> Identity {
        Identity::new(Principal::new("alice", "hash", role))
    }

    #[test]
    fn test_role_checks_are_exact() {
        let moderator = identity(Role::Moderator);

        assert!(moderator.has_role(Role::Moderator));
        assert!(!moderator.has_role(Role::Admin));
        assert!(!moderator.has_role(Role::User));

        assert!(moderator.require_role(Role::Moderator).is_ok());
        assert_eq!(
            moderator.require_role(Role::Admin),
            Err(AuthError::Forbidden {
                required: Role::Admin
            })
        );
    }

    #[tokio::test]
    async fn test_extractor_reads_installed_identity() {
        let mut req = Request::builder().uri("/users/me").body(()).unwrap();
        req.extensions_mut().insert(identity(Role::User));
        let (mut parts, _) = req.into_parts();

        let extracted = Identity::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted.subject(), "alice");
        assert_eq!(extracted.role(), Role::User);
    }

    #[tokio::test]
    async fn test_extractor_rejects_missing_identity() {
        let req = Request::builder().uri("/users/me").body(()).unwrap();
        let (mut parts, _) = req.into_parts();

        let rejection = Identity::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(
            rejection.error(),
            AuthError::Unauthenticated {
                credential_presented: false
            }
        );
    }
}
