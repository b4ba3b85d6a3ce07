//! Signup, login and role listing.

use std::sync::OnceLock;

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use boutique_auth::Role;
use boutique_crypto::{hash_password, verify_password};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{validate_username, NewUser, UserView};

const MIN_PASSWORD_LEN: usize = 8;

/// Rejects passwords shorter than the minimum length.
pub(crate) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash verified against when the login names no user, so both failure
/// paths pay for one Argon2 verification.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("boutique-unknown-user").ok())
        .as_deref()
}

/// Signup payload.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Login name.
    pub username: String,
    /// Email.
    pub email: String,
    /// Clear-text password.
    pub password: String,
    /// Requested role. Defaults to USER.
    #[serde(default)]
    pub role: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Login payload.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username, or email when it contains `@`.
    #[serde(alias = "email")]
    pub username: String,
    /// Clear-text password.
    pub password: String,
}

/// Successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Signed bearer token.
    pub token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
    /// The logged-in user.
    pub user: UserView,
}

/// `POST /user/signup`
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let Json(req) = payload?;

    validate_username(&req.username)?;
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("email is invalid".to_string()));
    }
    validate_password(&req.password)?;

    let role = match req.role.as_deref() {
        None => Role::User,
        Some(name) => name
            .parse::<Role>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
    };
    if role != Role::User && !state.signup.allow_privileged_roles {
        return Err(ApiError::Forbidden("role cannot be self-assigned".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let record = state
        .users
        .create(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
            role,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserView::from(&record))))
}

/// `POST /user/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = payload?;

    let Some(record) = state.users.find_by_login(&req.username).await? else {
        if let Some(hash) = dummy_hash() {
            let _ = verify_password(&req.password, hash);
        }
        debug!("Login failed: unknown user");
        return Err(ApiError::BadCredentials);
    };

    // A corrupt stored hash fails the same way as a wrong password.
    if !verify_password(&req.password, &record.password_hash).unwrap_or(false) {
        debug!(username = %record.username, "Login failed: wrong password");
        return Err(ApiError::BadCredentials);
    }

    let token = state
        .codec
        .issue(&record.username, std::slice::from_ref(&record.role))
        .map_err(|e| ApiError::Internal(format!("token issuance: {e}")))?;

    info!(username = %record.username, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.codec.ttl().as_secs(),
        user: UserView::from(&record),
    }))
}

/// `GET /role` and `GET /role/`
pub async fn list_roles() -> Json<Vec<&'static str>> {
    Json(Role::ALL.iter().map(Role::as_str).collect())
}
