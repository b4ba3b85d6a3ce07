//! Authentication gate.
//!
//! Middleware that turns a bearer token into an [`Identity`] on the
//! request. Requests without a bearer credential pass through untouched and
//! are left for the access decision to judge.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::access::PublicPaths;
use crate::context::{CredentialPresented, Identity};
use crate::error::AuthError;
use crate::principal::PrincipalStore;
use crate::responder::respond;
use crate::token::TokenCodec;

/// Default bound on a single principal lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared, read-only state of the gate.
#[derive(Clone)]
pub struct GateState {
    codec: Arc<TokenCodec>,
    store: Arc<dyn PrincipalStore>,
    public_paths: Arc<PublicPaths>,
    lookup_timeout: Duration,
}

impl GateState {
    /// Creates the gate state.
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn PrincipalStore>,
        public_paths: Arc<PublicPaths>,
    ) -> Self {
        Self {
            codec,
            store,
            public_paths,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Overrides the principal lookup timeout.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Validates `token` and resolves its principal.
    ///
    /// Returns `Ok(None)` when `already_installed` is set: the token is still
    /// checked, but the existing identity is kept as-is.
    pub async fn authenticate_token(
        &self,
        token: &str,
        already_installed: bool,
    ) -> Result<Option<Identity>, AuthError> {
        let now = Utc::now();
        let claims = self.codec.parse_at(token, now)?;

        if already_installed {
            return Ok(None);
        }

        let lookup = tokio::time::timeout(self.lookup_timeout, self.store.lookup(&claims.sub));
        let principal = match lookup.await {
            Ok(Ok(principal)) => principal,
            Ok(Err(err)) => {
                debug!(store = self.store.name(), error = %err, "Principal lookup failed");
                return Err(AuthError::Malformed);
            },
            Err(_) => {
                warn!(
                    store = self.store.name(),
                    timeout_ms = self.lookup_timeout.as_millis() as u64,
                    "Principal lookup timed out"
                );
                return Err(AuthError::Malformed);
            },
        };

        if !self.codec.is_valid_at(token, &principal.identifier, now) {
            return Err(AuthError::Malformed);
        }

        Ok(Some(Identity::new(principal)))
    }
}

/// What the `Authorization` header holds.
#[derive(Debug, PartialEq, Eq)]
enum Credential<'a> {
    Absent,
    Unsupported,
    Bearer(&'a str),
}

fn bearer_credential(headers: &HeaderMap) -> Credential<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Credential::Absent;
    };

    match value.to_str().ok().and_then(|s| s.strip_prefix("Bearer ")) {
        Some(token) => Credential::Bearer(token.trim()),
        None => Credential::Unsupported,
    }
}

/// Authentication middleware.
///
/// For each request:
/// 1. Allow-listed paths skip the gate entirely
/// 2. No bearer credential: continue unauthenticated
/// 3. Bearer token: parse, resolve the subject, check it, install [`Identity`]
/// 4. Any failure: respond with 401 and stop
pub async fn authenticate(
    State(gate): State<GateState>,
    mut req: Request,
    next: Next,
) -> Response {
    if gate.public_paths.matches(req.uri().path()) {
        return next.run(req).await;
    }

    let token = match bearer_credential(req.headers()) {
        Credential::Absent => return next.run(req).await,
        Credential::Unsupported => {
            req.extensions_mut().insert(CredentialPresented);
            return next.run(req).await;
        },
        Credential::Bearer(token) => token.to_owned(),
    };

    let already_installed = req.extensions().get::<Identity>().is_some();

    match gate.authenticate_token(&token, already_installed).await {
        Ok(Some(identity)) => {
            debug!(subject = %identity.subject(), role = %identity.role(), "Request authenticated");
            req.extensions_mut().insert(identity);
            next.run(req).await
        },
        Ok(None) => next.run(req).await,
        Err(err) => {
            req.extensions_mut().remove::<Identity>();
            debug!(path = %req.uri().path(), error = %err, "Authentication failed");
            respond(req.uri().path(), &err)
        },
    }
}
