//! Storage wrappers for tests.

use std::time::Duration;

use async_trait::async_trait;
use boutique_storage::{MemoryBackend, StorageBackend, StorageError};

/// In-memory backend whose reads take `delay`, to widen race windows.
pub(crate) struct SlowGet {
    inner: MemoryBackend,
    delay: Duration,
}

impl SlowGet {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryBackend::new(),
            delay,
        }
    }
}

#[async_trait]
impl StorageBackend for SlowGet {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.inner.put(key, value).await
    }

    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        self.inner.put_if_absent(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix).await
    }
}
