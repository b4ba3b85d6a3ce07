//! # Boutique Storage - SQLite Backend
//!
//! SQLite implementation of the storage backend. All records live in a
//! single `records` table inside `{data_dir}/{name}.db`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use boutique_storage::{StorageBackend, StorageError};

/// SQLite storage backend.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteBackend {
    /// Opens or creates the SQLite database `{data_dir}/{name}.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The database name is invalid
    /// - The directory cannot be created
    /// - The connection or the schema migration fails
    pub async fn open(data_dir: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        Self::validate_name(name)?;

        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = dir.join(format!("{name}.db"));
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let backend = Self { pool, db_path };
        backend.migrate().await?;

        info!(path = %backend.db_path.display(), "SQLite backend ready");

        Ok(backend)
    }

    /// Returns the path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Only allows lowercase letters, digits, underscore and hyphen, so the
    /// name can never escape the data directory.
    fn validate_name(name: &str) -> Result<(), StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput(
                "database name cannot be empty".into(),
            ));
        }

        if name.len() > 64 {
            return Err(StorageError::InvalidInput("database name too long".into()));
        }

        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if !valid {
            return Err(StorageError::InvalidInput(
                "database name must match [a-z0-9_-]+".into(),
            ));
        }

        Ok(())
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key        TEXT PRIMARY KEY,
                value      BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;

        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(row.map(|(v,)| v))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let now = Self::now();

        sqlx::query(
            r#"
            INSERT INTO records (key, value, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        let now = Self::now();

        let result = sqlx::query(
            r#"
            INSERT INTO records (key, value, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // substr instead of LIKE: keys may contain `%` or `_`
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT key FROM records WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqliteBackend) {
        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::open(tmp.path(), "boutique").await.unwrap();
        (tmp, backend)
    }

    #[tokio::test]
    async fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::open(tmp.path(), "shop").await.unwrap();

        let db_path = tmp.path().join("shop.db");
        assert!(db_path.exists(), "database file should be created");
        assert_eq!(backend.path(), db_path.as_path());
    }

    #[tokio::test]
    async fn test_name_validation() {
        let tmp = TempDir::new().unwrap();

        let invalid_names = ["", "Shop", "my shop", "shop/sub", "../escape", "shop.db"];

        for name in invalid_names {
            let result = SqliteBackend::open(tmp.path(), name).await;
            assert!(
                matches!(result, Err(StorageError::InvalidInput(_))),
                "should reject database name: {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let (_tmp, backend) = setup().await;

        assert!(backend.get("users/alice").await.unwrap().is_none());

        backend.put("users/alice", b"v1").await.unwrap();
        assert_eq!(
            backend.get("users/alice").await.unwrap(),
            Some(b"v1".to_vec())
        );

        backend.put("users/alice", b"v2").await.unwrap();
        assert_eq!(
            backend.get("users/alice").await.unwrap(),
            Some(b"v2".to_vec())
        );

        assert!(backend.delete("users/alice").await.unwrap());
        assert!(backend.get("users/alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_returns_false() {
        let (_tmp, backend) = setup().await;
        assert!(!backend.delete("nonexistent").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_if_absent_is_first_writer_wins() {
        let (_tmp, backend) = setup().await;

        assert!(backend.put_if_absent("emails/a@b.c", b"alice").await.unwrap());
        assert!(!backend.put_if_absent("emails/a@b.c", b"mallory").await.unwrap());

        assert_eq!(
            backend.get("emails/a@b.c").await.unwrap(),
            Some(b"alice".to_vec())
        );
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let (_tmp, backend) = setup().await;

        backend.put("users/bob", b"1").await.unwrap();
        backend.put("users/alice", b"2").await.unwrap();
        backend.put("users_archive/x", b"3").await.unwrap();
        backend.put("products/1", b"4").await.unwrap();

        let keys = backend.list("users/").await.unwrap();
        assert_eq!(keys, vec!["users/alice", "users/bob"]);

        let keys = backend.list("orders/").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let backend = SqliteBackend::open(tmp.path(), "boutique").await.unwrap();
            backend.put("products/1", b"lamp").await.unwrap();
        }

        let backend = SqliteBackend::open(tmp.path(), "boutique").await.unwrap();
        assert_eq!(
            backend.get("products/1").await.unwrap(),
            Some(b"lamp".to_vec())
        );
    }
}
