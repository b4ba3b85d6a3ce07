//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be opened or reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A query or statement failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Invalid input (bad key, bad database name).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}
