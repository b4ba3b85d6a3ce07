//! Storage backend trait definition.

use async_trait::async_trait;

use crate::error::StorageError;

/// Storage backend trait for implementing different storage engines.
///
/// Implementations must tolerate concurrent readers and writers; every
/// request handler holds a shared reference to the same backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a value with a key, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Insert a value only if the key is vacant.
    ///
    /// Returns `true` if the value was inserted, `false` if the key was taken.
    /// The check and the insert happen atomically.
    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StorageError>;

    /// Delete a value by key. Returns `true` if a value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// List keys with a prefix, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
