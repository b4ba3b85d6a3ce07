//! Catalogue and purchases.

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use boutique_auth::Identity;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::products::{NewProduct, Product, ProductQuery};
use crate::state::AppState;

/// Purchase payload. An empty body buys one unit.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Units to buy.
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

/// `GET /products?category=&sort=name|price|newest&page=&size=`
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.products.list(&query).await?))
}

/// `GET /products/{id}`
pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;

    let product = state
        .products
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {id}")))?;

    Ok(Json(product))
}

/// `POST /products`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(new) = payload?;
    let product = state.products.create(new).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PUT /products/{id}`
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;
    let Json(new) = payload?;
    Ok(Json(state.products.update(&id, new).await?))
}

/// `DELETE /products/{id}`
pub async fn delete(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.products.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /products/{id}/purchase`
pub async fn purchase(
    State(state): State<AppState>,
    identity: Identity,
    id: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;
    let quantity = if body.is_empty() {
        1
    } else {
        serde_json::from_slice::<PurchaseRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid purchase request: {e}")))?
            .quantity
    };

    let product = state.products.purchase(&id, quantity).await?;
    info!(
        username = identity.subject(),
        product = %id,
        quantity,
        "Purchase completed"
    );

    Ok(Json(product))
}
