//! User accounts.
//!
//! Users live under `users/<username>` as JSON. A second record,
//! `emails/<email>`, maps each email to its owner and keeps emails unique.
//! The repository is also the [`PrincipalStore`] behind the gate.

use std::sync::Arc;

use async_trait::async_trait;
use boutique_auth::{LookupError, Principal, PrincipalStore, Role};
use boutique_storage::StorageBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ApiError;

const USERS_PREFIX: &str = "users/";
const EMAILS_PREFIX: &str = "emails/";

/// Stored user record.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique login name, also the token subject.
    pub username: String,
    /// Unique email, stored lower-cased.
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// Role name as stored. Parsed on every lookup.
    pub role: String,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    /// Login name.
    pub username: String,
    /// Email.
    pub email: String,
    /// Role name.
    pub role: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone(),
            email: record.email.clone(),
            role: record.role.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            created_at: record.created_at,
        }
    }
}

/// A validated account about to be created.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Email, any case.
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// Granted role.
    pub role: Role,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
}

/// Returns `Ok` if `username` is 3 to 32 characters of `[A-Za-z0-9_.-]`.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    let valid_len = (3..=32).contains(&username.len());
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if valid_len && valid_chars {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "username must be 3 to 32 characters of letters, digits, '_', '.' or '-'".to_string(),
        ))
    }
}

fn user_key(username: &str) -> String {
    format!("{USERS_PREFIX}{username}")
}

fn email_key(email: &str) -> String {
    format!("{EMAILS_PREFIX}{}", email.to_lowercase())
}

/// Profile fields a user may change. `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    /// New email.
    #[serde(default)]
    pub email: Option<String>,
    /// New given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

/// User accounts over a storage backend.
#[derive(Clone)]
pub struct UserRepository {
    storage: Arc<dyn StorageBackend>,
    // Serializes read-modify-write of user records within this process.
    write_lock: Arc<Mutex<()>>,
}

impl UserRepository {
    /// Creates a repository.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn existing(&self, username: &str) -> Result<UserRecord, ApiError> {
        self.get(username)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User not found: {username}")))
    }

    async fn store(&self, record: &UserRecord) -> Result<(), ApiError> {
        self.storage
            .put(&user_key(&record.username), &serde_json::to_vec(record)?)
            .await?;
        Ok(())
    }

    /// Creates an account.
    ///
    /// Fails with `Conflict("Username already taken")` or
    /// `Conflict("Email already taken")`, checked in that order.
    pub async fn create(&self, new: NewUser) -> Result<UserRecord, ApiError> {
        let record = UserRecord {
            username: new.username,
            email: new.email.to_lowercase(),
            password_hash: new.password_hash,
            role: new.role.as_str().to_string(),
            first_name: new.first_name,
            last_name: new.last_name,
            created_at: Utc::now(),
        };

        let user_key = user_key(&record.username);
        let encoded = serde_json::to_vec(&record)?;
        if !self.storage.put_if_absent(&user_key, &encoded).await? {
            return Err(ApiError::Conflict("Username already taken".to_string()));
        }

        let claimed = self
            .storage
            .put_if_absent(&email_key(&record.email), record.username.as_bytes())
            .await;
        match claimed {
            Ok(true) => {},
            Ok(false) => {
                self.storage.delete(&user_key).await?;
                return Err(ApiError::Conflict("Email already taken".to_string()));
            },
            Err(err) => {
                self.storage.delete(&user_key).await?;
                return Err(err.into());
            },
        }

        info!(username = %record.username, role = %record.role, "User created");
        Ok(record)
    }

    /// Returns a user by username.
    pub async fn get(&self, username: &str) -> Result<Option<UserRecord>, ApiError> {
        match self.storage.get(&user_key(username)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns a user by username, or by email when `login` contains `@`.
    pub async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, ApiError> {
        if !login.contains('@') {
            return self.get(login).await;
        }

        match self.storage.get(&email_key(login)).await? {
            Some(owner) => {
                let username = String::from_utf8(owner)
                    .map_err(|_| ApiError::Internal("email index is not UTF-8".to_string()))?;
                self.get(&username).await
            },
            None => Ok(None),
        }
    }

    /// Lists every user, ordered by username.
    pub async fn list(&self) -> Result<Vec<UserRecord>, ApiError> {
        let keys = self.storage.list(USERS_PREFIX).await?;
        let mut users = Vec::with_capacity(keys.len());

        for key in keys {
            if let Some(bytes) = self.storage.get(&key).await? {
                users.push(serde_json::from_slice(&bytes)?);
            }
        }

        Ok(users)
    }

    /// Changes a user's role.
    pub async fn set_role(&self, username: &str, role: Role) -> Result<UserRecord, ApiError> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.existing(username).await?;
        record.role = role.as_str().to_string();
        self.store(&record).await?;

        info!(username, role = %role, "User role changed");
        Ok(record)
    }

    /// Replaces a user's password hash.
    pub async fn set_password_hash(
        &self,
        username: &str,
        password_hash: String,
    ) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.existing(username).await?;
        record.password_hash = password_hash;
        self.store(&record).await?;

        info!(username, "Password changed");
        Ok(())
    }

    /// Updates profile fields.
    ///
    /// A new email is claimed before the record changes and the old one is
    /// released afterwards; a taken email fails with
    /// `Conflict("Email already taken")`.
    pub async fn update_profile(
        &self,
        username: &str,
        update: ProfileUpdate,
    ) -> Result<UserRecord, ApiError> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.existing(username).await?;
        let previous_email = record.email.clone();

        if let Some(email) = update.email {
            let email = email.to_lowercase();
            if !email.contains('@') {
                return Err(ApiError::BadRequest("email is invalid".to_string()));
            }
            if email != previous_email {
                let claimed = self
                    .storage
                    .put_if_absent(&email_key(&email), username.as_bytes())
                    .await?;
                if !claimed {
                    return Err(ApiError::Conflict("Email already taken".to_string()));
                }
                record.email = email;
            }
        }
        if update.first_name.is_some() {
            record.first_name = update.first_name;
        }
        if update.last_name.is_some() {
            record.last_name = update.last_name;
        }

        if let Err(err) = self.store(&record).await {
            if record.email != previous_email {
                self.storage.delete(&email_key(&record.email)).await?;
            }
            return Err(err);
        }

        if record.email != previous_email {
            self.storage.delete(&email_key(&previous_email)).await?;
        }

        info!(username, "Profile updated");
        Ok(record)
    }

    /// Deletes a user and frees its email.
    ///
    /// The email index goes first, so a failure part-way leaves a record
    /// that a retried delete still finds.
    pub async fn delete(&self, username: &str) -> Result<(), ApiError> {
        let _guard = self.write_lock.lock().await;

        let record = self.existing(username).await?;

        self.storage.delete(&email_key(&record.email)).await?;
        self.storage.delete(&user_key(username)).await?;

        info!(username, "User deleted");
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for UserRepository {
    async fn lookup(&self, identifier: &str) -> Result<Principal, LookupError> {
        let bytes = self
            .storage
            .get(&user_key(identifier))
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?
            .ok_or(LookupError::NotFound)?;

        let record: UserRecord = serde_json::from_slice(&bytes)
            .map_err(|e| LookupError::InvalidRecord(e.to_string()))?;

        let role = record.role.parse::<Role>().map_err(|e| {
            warn!(username = identifier, role = %record.role, "Stored role is unknown");
            LookupError::InvalidRecord(e.to_string())
        })?;

        Ok(Principal::new(record.username, record.password_hash, role))
    }

    fn name(&self) -> &'static str {
        "users"
    }
}
