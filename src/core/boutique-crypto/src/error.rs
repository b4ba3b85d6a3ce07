//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key format or size.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Password hashing failed.
    #[error("password hashing failed")]
    HashingFailed,

    /// Stored password hash could not be parsed.
    #[error("invalid password hash format")]
    InvalidHash,
}
