//! HTTP handlers.

pub mod accounts;
pub mod products;
pub mod users;

use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiError;

/// Liveness check.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("The requested resource was not found. Please check the URL.".to_string())
}
