//! SQLite-backed link table.
//!
//! # Database Schema
//!
//! - `provider_id`: provider owning the link
//! - `object_kind`: `User` or `Group`
//! - `object_ref`: local object reference
//! - `external_id`: identifier in the directory
//! - `created_at`: RFC 3339 timestamp
//! - Primary key: (provider_id, object_kind, object_ref)
//!
//! The primary key is the uniqueness constraint the sync client relies on:
//! [`LinkStore::insert`] never overwrites an existing row.
//!
//! # Usage
//!
//! ```rust
//! use directory_sync::storage::{LinkStore, SqliteLinkStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Persistent file, parent directories created as needed
//! let store = SqliteLinkStore::new_with_path("sync_data/links.db").await?;
//!
//! // Or in-memory for testing
//! let store = SqliteLinkStore::new_in_memory().await?;
//! assert_eq!(store.count("google").await?, 0);
//! # Ok(())
//! # }
//! ```

use crate::object::ObjectKind;
use crate::storage::{LinkKey, LinkRecord, LinkStore, LinkStoreError};
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// SQLite [`LinkStore`]. Cloning shares the connection pool.
#[derive(Clone)]
pub struct SqliteLinkStore {
    pool: SqlitePool,
}

impl SqliteLinkStore {
    /// Open or create the database at `database_path`.
    ///
    /// Creates the file and any missing parent directories.
    pub async fn new_with_path(database_path: &str) -> Result<Self, LinkStoreError> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LinkStoreError::configuration(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            LinkStoreError::configuration(format!(
                "Failed to connect to SQLite database at {}: {}",
                database_path, e
            ))
        })?;

        let store = Self { pool };
        store.initialize_schema().await?;
        debug!("Opened link table at {}", database_path);
        Ok(store)
    }

    /// Create an in-memory database.
    ///
    /// The pool holds a single connection that is never recycled, since an
    /// in-memory database lives only as long as its connection.
    pub async fn new_in_memory() -> Result<Self, LinkStoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            LinkStoreError::configuration(format!("Invalid in-memory SQLite options: {}", e))
        })?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| {
                LinkStoreError::configuration(format!("Failed to create in-memory SQLite: {}", e))
            })?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<(), LinkStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_links (
                provider_id TEXT NOT NULL,
                object_kind TEXT NOT NULL,
                object_ref TEXT NOT NULL,
                external_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (provider_id, object_kind, object_ref)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LinkStoreError::internal(format!("Failed to create schema: {}", e)))?;

        Ok(())
    }

    fn decode(row: &SqliteRow) -> Result<LinkRecord, LinkStoreError> {
        let kind: String = row.get("object_kind");
        let created_at: String = row.get("created_at");

        let object_kind = ObjectKind::from_str(&kind)
            .map_err(|e| LinkStoreError::serialization_in(e, "object_kind"))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| LinkStoreError::serialization_in(e.to_string(), "created_at"))?
            .with_timezone(&Utc);

        Ok(LinkRecord {
            provider_id: row.get("provider_id"),
            object_kind,
            object_ref: row.get("object_ref"),
            external_id: row.get("external_id"),
            created_at,
        })
    }
}

/// Pool exhaustion and I/O are worth retrying; anything else is not.
fn map_sqlx_error(context: &str, error: sqlx::Error) -> LinkStoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            LinkStoreError::unavailable(format!("{}: {}", context, error))
        }
        other => LinkStoreError::internal_with_source(context.to_string(), Box::new(other)),
    }
}

impl LinkStore for SqliteLinkStore {
    async fn find(&self, key: &LinkKey) -> Result<Option<LinkRecord>, LinkStoreError> {
        let row = sqlx::query(
            "SELECT * FROM sync_links WHERE provider_id = ? AND object_kind = ? AND object_ref = ?",
        )
        .bind(key.provider_id())
        .bind(key.kind().as_str())
        .bind(key.object_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch link", e))?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn insert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        let result = sqlx::query(
            "INSERT INTO sync_links (provider_id, object_kind, object_ref, external_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (provider_id, object_kind, object_ref) DO NOTHING",
        )
        .bind(&record.provider_id)
        .bind(record.object_kind.as_str())
        .bind(&record.object_ref)
        .bind(&record.external_id)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert link", e))?;

        if result.rows_affected() == 0 {
            let key = record.key();
            let existing = self.find(&key).await?.map(|link| link.external_id);
            return Err(LinkStoreError::already_linked(key, existing));
        }
        Ok(record)
    }

    async fn upsert(&self, record: LinkRecord) -> Result<LinkRecord, LinkStoreError> {
        sqlx::query(
            "INSERT INTO sync_links (provider_id, object_kind, object_ref, external_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (provider_id, object_kind, object_ref)
             DO UPDATE SET external_id = excluded.external_id, created_at = excluded.created_at",
        )
        .bind(&record.provider_id)
        .bind(record.object_kind.as_str())
        .bind(&record.object_ref)
        .bind(&record.external_id)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to store link", e))?;

        Ok(record)
    }

    async fn delete(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        let result = sqlx::query(
            "DELETE FROM sync_links WHERE provider_id = ? AND object_kind = ? AND object_ref = ?",
        )
        .bind(key.provider_id())
        .bind(key.kind().as_str())
        .bind(key.object_ref())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to delete link", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, key: &LinkKey) -> Result<bool, LinkStoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM sync_links WHERE provider_id = ? AND object_kind = ? AND object_ref = ?",
        )
        .bind(key.provider_id())
        .bind(key.kind().as_str())
        .bind(key.object_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to check link existence", e))?;

        Ok(row.is_some())
    }

    async fn list(
        &self,
        provider_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LinkRecord>, LinkStoreError> {
        let rows = sqlx::query(
            "SELECT * FROM sync_links
             WHERE provider_id = ?
             ORDER BY object_kind, object_ref
             LIMIT ? OFFSET ?",
        )
        .bind(provider_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list links", e))?;

        rows.iter().map(Self::decode).collect()
    }

    async fn count(&self, provider_id: &str) -> Result<usize, LinkStoreError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM sync_links WHERE provider_id = ?")
            .bind(provider_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to count links", e))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), LinkStoreError> {
        sqlx::query("DELETE FROM sync_links")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Failed to clear links", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_links_survive_reopen() {
        let path = std::env::temp_dir()
            .join(format!("directory-sync-{}", uuid::Uuid::new_v4()))
            .join("links.db");
        let path = path.to_string_lossy().to_string();
        let key = LinkKey::new("google", ObjectKind::User, "42");

        {
            let store = SqliteLinkStore::new_with_path(&path).await.unwrap();
            store
                .insert(LinkRecord::new(key.clone(), "jane@example.com"))
                .await
                .unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteLinkStore::new_with_path(&path).await.unwrap();
        let link = reopened.find(&key).await.unwrap().unwrap();
        assert_eq!(link.external_id, "jane@example.com");

        reopened.pool.close().await;
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_created_at_is_preserved() {
        let store = SqliteLinkStore::new_in_memory().await.unwrap();
        let record = LinkRecord::new(LinkKey::new("p", ObjectKind::Group, "g"), "g-ext");
        store.insert(record.clone()).await.unwrap();

        let stored = store.find(&record.key()).await.unwrap().unwrap();
        // RFC 3339 keeps sub-second precision, so the round trip is exact.
        assert_eq!(stored, record);
    }
}
