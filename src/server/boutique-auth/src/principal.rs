//! Principals, roles and the principal store contract.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// User role.
///
/// Roles are flat: a route that requires `Moderator` is not open to `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Regular customer.
    User,
    /// Catalogue moderator.
    Moderator,
    /// Administrator.
    Admin,
}

impl Role {
    /// Every role, in ascending order of privilege.
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parses `user`, `moderator` or `admin`, case-insensitively, with an
    /// optional `ROLE_` prefix. Anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);

        match name {
            "USER" => Ok(Role::User),
            "MODERATOR" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Resolved identity backing a token subject.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique identifier, the token subject (username).
    pub identifier: String,
    /// Stored credential hash (Argon2id PHC string).
    pub credential_hash: String,
    /// The principal's single role.
    pub role: Role,
}

impl Principal {
    /// Creates a principal.
    pub fn new(
        identifier: impl Into<String>,
        credential_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            credential_hash: credential_hash.into(),
            role,
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("identifier", &self.identifier)
            .field("credential_hash", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

/// Errors returned by a [`PrincipalStore`].
#[derive(Debug, Error)]
pub enum LookupError {
    /// No principal with this identifier.
    #[error("principal not found")]
    NotFound,

    /// The stored record exists but cannot be turned into a principal
    /// (for example an unknown role name).
    #[error("invalid principal record: {0}")]
    InvalidRecord(String),

    /// The underlying store failed.
    #[error("principal store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only lookup of principals by identifier.
///
/// Implementations are shared by every in-flight request and must tolerate
/// concurrent lookups.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Resolves an identifier into a principal.
    async fn lookup(&self, identifier: &str) -> Result<Principal, LookupError>;

    /// Returns the name of this store for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Principal store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    principals: RwLock<HashMap<String, Principal>>,
}

impl MemoryPrincipalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a principal.
    pub async fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.identifier.clone(), principal);
    }

    /// Removes a principal, returning it if present.
    pub async fn remove(&self, identifier: &str) -> Option<Principal> {
        self.principals.write().await.remove(identifier)
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn lookup(&self, identifier: &str) -> Result<Principal, LookupError> {
        self.principals
            .read()
            .await
            .get(identifier)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
