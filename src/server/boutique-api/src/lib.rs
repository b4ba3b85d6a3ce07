//! # Boutique API
//!
//! REST layer for Boutique.
//!
//! ## Endpoints
//!
//! - `/user/signup`, `/user/login` - Account creation and token issuance
//! - `/role`, `/role/` - Role listing
//! - `/users/*` - Current user and user administration
//! - `/products/*` - Catalogue and purchases
//! - `/health` - Liveness
//!
//! Every route's access requirement is declared once in
//! [`route_requirements`] and enforced by the `boutique-auth` middleware.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod products;
pub mod routes;
pub mod state;
pub mod users;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    middleware,
    routing::{get, post, put},
    Router,
};
use boutique_auth::{
    access::{authorize, RouteTableError},
    gate::{authenticate, DEFAULT_LOOKUP_TIMEOUT},
    GateState, PublicPaths, Role, RouteRequirement, RouteTable,
};

pub use error::ApiError;
pub use state::{AppState, SignupPolicy};

/// API-level settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Paths reachable without a token.
    pub public_paths: PublicPaths,
    /// Bound on a single principal lookup.
    pub lookup_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_paths: PublicPaths::default(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

/// The access requirement of every route.
///
/// Routes not listed here require authentication; allow-listed paths are
/// public regardless.
pub fn route_requirements() -> Vec<(Method, &'static str, RouteRequirement)> {
    use RouteRequirement::{Authenticated, Public};

    vec![
        (Method::GET, "/health", Public),
        (Method::GET, "/users/me", Authenticated),
        (Method::PUT, "/users/me", Authenticated),
        (Method::PUT, "/users/me/password", Authenticated),
        (Method::GET, "/users", RouteRequirement::Role(Role::Admin)),
        (Method::GET, "/users/{username}", RouteRequirement::Role(Role::Admin)),
        (Method::PUT, "/users/{username}/role", RouteRequirement::Role(Role::Admin)),
        (Method::DELETE, "/users/{username}", RouteRequirement::Role(Role::Admin)),
        (Method::GET, "/products", Authenticated),
        (Method::GET, "/products/{id}", Authenticated),
        (Method::POST, "/products", RouteRequirement::Role(Role::Admin)),
        (Method::PUT, "/products/{id}", RouteRequirement::Role(Role::Admin)),
        (Method::DELETE, "/products/{id}", RouteRequirement::Role(Role::Admin)),
        (Method::POST, "/products/{id}/purchase", RouteRequirement::Role(Role::User)),
    ]
}

/// Builds the application router with authentication and error rendering.
///
/// Layer order, outermost first: error rendering, authentication gate,
/// access decision, handler.
pub fn router(state: AppState, config: &ApiConfig) -> Result<Router, RouteTableError> {
    let public_paths = Arc::new(config.public_paths.clone());

    let mut table = RouteTable::new(public_paths.clone());
    for (method, path, requirement) in route_requirements() {
        table.insert(method, path, requirement)?;
    }

    let gate = GateState::new(
        state.codec.clone(),
        Arc::new(state.users.clone()),
        public_paths,
    )
    .with_lookup_timeout(config.lookup_timeout);

    Ok(Router::new()
        .route("/health", get(routes::health))
        .route("/role", get(routes::accounts::list_roles))
        .route("/role/", get(routes::accounts::list_roles))
        .route("/user/signup", post(routes::accounts::signup))
        .route("/user/login", post(routes::accounts::login))
        .route(
            "/users/me",
            get(routes::users::me).put(routes::users::update_me),
        )
        .route("/users/me/password", put(routes::users::change_password))
        .route("/users", get(routes::users::list))
        .route(
            "/users/{username}",
            get(routes::users::get).delete(routes::users::delete),
        )
        .route("/users/{username}/role", put(routes::users::set_role))
        .route(
            "/products",
            get(routes::products::list).post(routes::products::create),
        )
        .route(
            "/products/{id}",
            get(routes::products::get)
                .put(routes::products::update)
                .delete(routes::products::delete),
        )
        .route("/products/{id}/purchase", post(routes::products::purchase))
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(Arc::new(table), authorize))
        .layer(middleware::from_fn_with_state(gate, authenticate))
        .layer(middleware::from_fn(error::render_errors))
        .with_state(state))
}
