//! Current user and user administration.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use boutique_auth::{Identity, Role};
use boutique_crypto::{hash_password, verify_password};
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::accounts::validate_password;
use crate::state::AppState;
use crate::users::{ProfileUpdate, UserView};

/// Role change payload.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    /// New role name.
    pub role: String,
}

/// `GET /users/me`
pub async fn me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserView>, ApiError> {
    let record = state
        .users
        .get(identity.subject())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", identity.subject())))?;

    Ok(Json(UserView::from(&record)))
}

/// Password change payload.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Password in use.
    pub current_password: String,
    /// Replacement, at least as long as a signup password.
    pub new_password: String,
}

/// `PUT /users/me`
pub async fn update_me(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Json(update) = payload?;
    let record = state.users.update_profile(identity.subject(), update).await?;
    Ok(Json(UserView::from(&record)))
}

/// `PUT /users/me/password`
///
/// Existing tokens stay valid; they are bound to the username, not the
/// password.
pub async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload?;
    validate_password(&req.new_password)?;

    let record = state
        .users
        .get(identity.subject())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", identity.subject())))?;

    if !verify_password(&req.current_password, &record.password_hash).unwrap_or(false) {
        return Err(ApiError::BadCredentials);
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .users
        .set_password_hash(identity.subject(), password_hash)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users`
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state.users.list().await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

/// `GET /users/{username}`
pub async fn get(
    State(state): State<AppState>,
    username: Result<Path<String>, PathRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Path(username) = username?;

    let record = state
        .users
        .get(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {username}")))?;

    Ok(Json(UserView::from(&record)))
}

/// `PUT /users/{username}/role`
pub async fn set_role(
    State(state): State<AppState>,
    username: Result<Path<String>, PathRejection>,
    payload: Result<Json<SetRoleRequest>, JsonRejection>,
) -> Result<Json<UserView>, ApiError> {
    let Path(username) = username?;
    let Json(req) = payload?;

    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let record = state.users.set_role(&username, role).await?;
    Ok(Json(UserView::from(&record)))
}

/// `DELETE /users/{username}`
pub async fn delete(
    State(state): State<AppState>,
    username: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(username) = username?;
    state.users.delete(&username).await?;
    Ok(StatusCode::NO_CONTENT)
}
