//! In-memory storage backend.
//!
//! Used by development mode and tests. Contents are lost on restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// Storage backend keeping every record in an ordered map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.records.write().await.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud() {
        let backend = MemoryBackend::new();

        assert!(backend.get("users/alice").await.unwrap().is_none());

        backend.put("users/alice", b"v1").await.unwrap();
        assert_eq!(
            backend.get("users/alice").await.unwrap(),
            Some(b"v1".to_vec())
        );
        assert!(backend.exists("users/alice").await.unwrap());

        backend.put("users/alice", b"v2").await.unwrap();
        assert_eq!(
            backend.get("users/alice").await.unwrap(),
            Some(b"v2".to_vec())
        );

        assert!(backend.delete("users/alice").await.unwrap());
        assert!(!backend.delete("users/alice").await.unwrap());
        assert!(!backend.exists("users/alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let backend = MemoryBackend::new();

        assert!(backend.put_if_absent("emails/a@b.c", b"alice").await.unwrap());
        assert!(!backend.put_if_absent("emails/a@b.c", b"mallory").await.unwrap());

        assert_eq!(
            backend.get("emails/a@b.c").await.unwrap(),
            Some(b"alice".to_vec())
        );
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let backend = MemoryBackend::new();

        backend.put("users/bob", b"1").await.unwrap();
        backend.put("users/alice", b"2").await.unwrap();
        backend.put("products/1", b"3").await.unwrap();
        backend.put("usersx", b"4").await.unwrap();

        let keys = backend.list("users/").await.unwrap();
        assert_eq!(keys, vec!["users/alice", "users/bob"]);

        let keys = backend.list("orders/").await.unwrap();
        assert!(keys.is_empty());

        let keys = backend.list("").await.unwrap();
        assert_eq!(keys.len(), 4);
    }
}
