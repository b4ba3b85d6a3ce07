//! Route requirements and the access decision.
//!
//! Every route declares whether it is public, needs any authenticated
//! identity, or needs one specific role. The requirement is looked up per
//! request in a [`RouteTable`] and checked by [`decide`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tracing::debug;

use crate::context::{CredentialPresented, Identity};
use crate::error::AuthError;
use crate::principal::Role;
use crate::responder::respond;

/// What a route demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRequirement {
    /// Anyone, with or without a token.
    Public,
    /// Any authenticated identity.
    Authenticated,
    /// An identity holding exactly this role.
    Role(Role),
}

/// One entry of the unauthenticated allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicPath {
    /// Matches this path only.
    Exact(String),
    /// Matches every path starting with this prefix.
    Prefix(String),
}

impl PublicPath {
    /// Parses an allow-list entry.
    ///
    /// A trailing `/` or `*` (as in `/images/` or `/images/**`) makes the
    /// entry a prefix; anything else is an exact path.
    pub fn parse(entry: &str) -> Self {
        let trimmed = entry.trim_end_matches('*');
        if trimmed.len() != entry.len() || trimmed.ends_with('/') {
            PublicPath::Prefix(trimmed.to_string())
        } else {
            PublicPath::Exact(entry.to_string())
        }
    }

    /// Returns `true` if `path` is covered by this entry.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PublicPath::Exact(p) => path == p,
            PublicPath::Prefix(p) => path.starts_with(p.as_str()),
        }
    }
}

/// The unauthenticated allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPaths {
    entries: Vec<PublicPath>,
}

impl PublicPaths {
    /// Creates an allow-list from explicit entries.
    pub fn new(entries: Vec<PublicPath>) -> Self {
        Self { entries }
    }

    /// Adds an entry.
    pub fn push(&mut self, entry: PublicPath) {
        self.entries.push(entry);
    }

    /// Returns `true` if any entry covers `path`.
    pub fn matches(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.matches(path))
    }

    /// The entries, in insertion order.
    pub fn entries(&self) -> &[PublicPath] {
        &self.entries
    }
}

impl Default for PublicPaths {
    /// Asset path, login/signup, role listing and the generic error path.
    fn default() -> Self {
        Self::new(vec![
            PublicPath::Prefix("/images/".to_string()),
            PublicPath::Exact("/role".to_string()),
            PublicPath::Prefix("/role/".to_string()),
            PublicPath::Exact("/user/login".to_string()),
            PublicPath::Exact("/user/signup".to_string()),
            PublicPath::Exact("/error".to_string()),
        ])
    }
}

/// Errors raised while building a [`RouteTable`].
#[derive(Debug, Error)]
pub enum RouteTableError {
    /// The pattern is invalid or conflicts with an existing one.
    #[error("failed to insert route pattern '{path}': {source}")]
    Insert {
        /// Offending pattern.
        path: String,
        /// Matcher error.
        #[source]
        source: matchit::InsertError,
    },
}

/// Per-method route patterns mapped to their requirement.
///
/// Patterns use the same `{param}` syntax as axum routes. Allow-listed
/// paths are always [`RouteRequirement::Public`]; anything not in the
/// table falls back to [`RouteRequirement::Authenticated`].
#[derive(Clone)]
pub struct RouteTable {
    routes: HashMap<Method, matchit::Router<RouteRequirement>>,
    public_paths: Arc<PublicPaths>,
}

impl RouteTable {
    /// Creates an empty table over the given allow-list.
    pub fn new(public_paths: Arc<PublicPaths>) -> Self {
        Self {
            routes: HashMap::new(),
            public_paths,
        }
    }

    /// Declares the requirement of `method path`.
    pub fn insert(
        &mut self,
        method: Method,
        path: &str,
        requirement: RouteRequirement,
    ) -> Result<(), RouteTableError> {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, requirement)
            .map_err(|source| RouteTableError::Insert {
                path: path.to_string(),
                source,
            })
    }

    /// Resolves the requirement for a concrete request.
    pub fn resolve(&self, method: &Method, path: &str) -> RouteRequirement {
        if self.public_paths.matches(path) {
            return RouteRequirement::Public;
        }

        let lookup = |m: &Method| {
            self.routes
                .get(m)
                .and_then(|router| router.at(path).ok())
                .map(|matched| *matched.value)
        };

        let found = match lookup(method) {
            None if *method == Method::HEAD => lookup(&Method::GET),
            found => found,
        };

        found.unwrap_or(RouteRequirement::Authenticated)
    }
}

/// Allows or denies a request.
///
/// `credential_presented` only matters when there is no identity: it picks
/// between the 401 and 403 flavours of [`AuthError::Unauthenticated`].
pub fn decide(
    identity: Option<&Identity>,
    requirement: RouteRequirement,
    credential_presented: bool,
) -> Result<(), AuthError> {
    let unauthenticated = AuthError::Unauthenticated {
        credential_presented,
    };

    match requirement {
        RouteRequirement::Public => Ok(()),
        RouteRequirement::Authenticated => identity.map(|_| ()).ok_or(unauthenticated),
        RouteRequirement::Role(required) => identity
            .ok_or(unauthenticated)
            .and_then(|id| id.require_role(required)),
    }
}

/// Access-decision middleware.
///
/// Must run after [`crate::gate::authenticate`], so it is layered closer to
/// the handlers.
pub async fn authorize(
    State(table): State<Arc<RouteTable>>,
    req: Request,
    next: Next,
) -> Response {
    let requirement = table.resolve(req.method(), req.uri().path());
    let identity = req.extensions().get::<Identity>();
    let presented = req.extensions().get::<CredentialPresented>().is_some();

    match decide(identity, requirement, presented) {
        Ok(()) => next.run(req).await,
        Err(err) => {
            debug!(
                path = %req.uri().path(),
                ?requirement,
                error = %err,
                "Access denied"
            );
            respond(req.uri().path(), &err)
        },
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::principal::Principal;

    fn identity(role: Role) -> Identity {
        Identity::new(Principal::new("alice", "hash", role))
    }

    fn table() -> RouteTable {
        let mut table = RouteTable::new(Arc::new(PublicPaths::default()));
        table
            .insert(Method::GET, "/health", RouteRequirement::Public)
            .unwrap();
        table
            .insert(Method::GET, "/products", RouteRequirement::Authenticated)
            .unwrap();
        table
            .insert(Method::POST, "/products", RouteRequirement::Role(Role::Admin))
            .unwrap();
        table
            .insert(
                Method::PUT,
                "/users/{username}/role",
                RouteRequirement::Role(Role::Admin),
            )
            .unwrap();
        table
    }

    #[test]
    fn test_public_path_parse() {
        assert_eq!(
            PublicPath::parse("/images/**"),
            PublicPath::Prefix("/images/".to_string())
        );
        assert_eq!(
            PublicPath::parse("/role/"),
            PublicPath::Prefix("/role/".to_string())
        );
        assert_eq!(
            PublicPath::parse("/error"),
            PublicPath::Exact("/error".to_string())
        );
    }

    #[test]
    fn test_default_allow_list() {
        let paths = PublicPaths::default();

        assert!(paths.matches("/images/users/default-image.png"));
        assert!(paths.matches("/role"));
        assert!(paths.matches("/role/"));
        assert!(paths.matches("/user/login"));
        assert!(paths.matches("/user/signup"));
        assert!(paths.matches("/error"));

        assert!(!paths.matches("/error/details"));
        assert!(!paths.matches("/user/login/extra"));
        assert!(!paths.matches("/users/me"));
        assert!(!paths.matches("/imagesx"));
        assert!(!paths.matches("/roles"));
    }

    #[test]
    fn test_resolve_uses_method_and_pattern() {
        let table = table();

        assert_eq!(
            table.resolve(&Method::GET, "/products"),
            RouteRequirement::Authenticated
        );
        assert_eq!(
            table.resolve(&Method::POST, "/products"),
            RouteRequirement::Role(Role::Admin)
        );
        assert_eq!(
            table.resolve(&Method::PUT, "/users/bob/role"),
            RouteRequirement::Role(Role::Admin)
        );
        assert_eq!(
            table.resolve(&Method::HEAD, "/health"),
            RouteRequirement::Public
        );
    }

    #[test]
    fn test_resolve_defaults() {
        let table = table();

        assert_eq!(
            table.resolve(&Method::GET, "/unknown"),
            RouteRequirement::Authenticated
        );
        assert_eq!(
            table.resolve(&Method::DELETE, "/products"),
            RouteRequirement::Authenticated
        );
        assert_eq!(
            table.resolve(&Method::POST, "/user/login"),
            RouteRequirement::Public
        );
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let mut table = table();
        let result = table.insert(Method::GET, "/products", RouteRequirement::Public);
        assert!(matches!(result, Err(RouteTableError::Insert { .. })));
    }

    #[test]
    fn test_decide_public_always_allows() {
        assert!(decide(None, RouteRequirement::Public, false).is_ok());
        assert!(decide(None, RouteRequirement::Public, true).is_ok());
        assert!(decide(Some(&identity(Role::User)), RouteRequirement::Public, false).is_ok());
    }

    #[test]
    fn test_decide_authenticated() {
        assert!(decide(
            Some(&identity(Role::User)),
            RouteRequirement::Authenticated,
            false
        )
        .is_ok());

        assert_eq!(
            decide(None, RouteRequirement::Authenticated, false),
            Err(AuthError::Unauthenticated {
                credential_presented: false
            })
        );
        assert_eq!(
            decide(None, RouteRequirement::Authenticated, true),
            Err(AuthError::Unauthenticated {
                credential_presented: true
            })
        );
    }

    #[test]
    fn test_decide_role_is_flat() {
        let admin_route = RouteRequirement::Role(Role::Admin);
        let user_route = RouteRequirement::Role(Role::User);

        assert!(decide(Some(&identity(Role::Admin)), admin_route, false).is_ok());
        assert!(decide(Some(&identity(Role::User)), user_route, false).is_ok());

        assert_eq!(
            decide(Some(&identity(Role::User)), admin_route, false),
            Err(AuthError::Forbidden {
                required: Role::Admin
            })
        );
        assert_eq!(
            decide(Some(&identity(Role::Admin)), user_route, false),
            Err(AuthError::Forbidden {
                required: Role::User
            })
        );
        assert_eq!(
            decide(None, admin_route, false),
            Err(AuthError::Unauthenticated {
                credential_presented: false
            })
        );
    }
}
