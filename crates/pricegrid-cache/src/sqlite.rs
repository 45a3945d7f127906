//! Durable cache tier backed by SQLite.
//!
//! Rows carry `(key, value, ttl_seconds, created_at)`; an entry with a
//! positive TTL is logically absent once `now - created_at > ttl_seconds`.
//! Expiry is enforced twice: [`SqliteBackend::sweep_expired`] bulk-deletes
//! elapsed rows on a schedule, and [`CacheBackend::get`]/[`CacheBackend::exists`]
//! reject (and delete) stale rows a sweep has not reached yet. Each check and
//! deletion is a single statement against one key, so a concurrent sweep and
//! read cannot produce a torn result.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::backend::CacheBackend;
use crate::error::CacheError;

// Path relative to crates/pricegrid-cache/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open (or create) the cache database and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the database cannot be opened or a
    /// migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, CacheError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// [`Self::connect`] with an explicit pool size.
    ///
    /// In-memory databases (`sqlite::memory:`) need `max_connections = 1`,
    /// since each new connection would otherwise see its own empty database.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the database cannot be opened or a
    /// migration fails.
    pub async fn connect_with(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .connect(database_url)
            .await?;
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete every entry whose TTL has elapsed. Returns the rows removed.
    ///
    /// Safe to run concurrently with ordinary reads and writes.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the delete statement fails.
    pub async fn sweep_expired(&self) -> Result<u64, CacheError> {
        let result =
            sqlx::query("DELETE FROM cache WHERE ttl_seconds > 0 AND ?1 - created_at > ttl_seconds")
                .bind(now_epoch())
                .execute(&self.pool)
                .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            tracing::info!(removed, "swept expired cache entries");
        }
        Ok(removed)
    }
}

impl SqliteBackend {
    async fn delete_if_expired(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query(
            "DELETE FROM cache WHERE key = ?1 AND ttl_seconds > 0 AND ?2 - created_at > ttl_seconds",
        )
        .bind(key)
        .bind(now_epoch())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

fn is_expired(ttl_seconds: i64, created_at: i64, now: i64) -> bool {
    ttl_seconds > 0 && now - created_at > ttl_seconds
}

#[async_trait]
impl CacheBackend for SqliteBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let row = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT value, ttl_seconds, created_at FROM cache WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((value, ttl_seconds, created_at)) = row else {
            return Ok(None);
        };

        if is_expired(ttl_seconds, created_at, now_epoch()) {
            // Lazy expiry: the sweep has not reached this row yet. The
            // delete re-checks expiry in one statement so a concurrent
            // fresh write under the same key is never clobbered.
            self.delete_if_expired(key).await?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&value)?))
    }

    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), CacheError> {
        let serialized = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO cache (key, value, ttl_seconds, created_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             ttl_seconds = excluded.ttl_seconds, created_at = excluded.created_at",
        )
        .bind(key)
        .bind(serialized)
        .bind(i64::try_from(ttl_seconds).unwrap_or(i64::MAX))
        .bind(now_epoch())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT ttl_seconds, created_at FROM cache WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((ttl_seconds, created_at)) => {
                Ok(!is_expired(ttl_seconds, created_at, now_epoch()))
            }
            None => Ok(false),
        }
    }

    async fn entry_count(&self) -> Result<u64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn backend() -> SqliteBackend {
        SqliteBackend::connect_with("sqlite::memory:", 1)
            .await
            .expect("in-memory sqlite")
    }

    /// Backdate a row so its TTL has elapsed without sleeping.
    async fn backdate(backend: &SqliteBackend, key: &str, secs: i64) {
        sqlx::query("UPDATE cache SET created_at = created_at - ?1 WHERE key = ?2")
            .bind(secs)
            .bind(key)
            .execute(backend.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let backend = backend().await;
        backend.set("k", &json!({"v": 1}), 0).await.unwrap();
        backdate(&backend, "k", 1_000_000).await;
        assert_eq!(backend.get("k").await.unwrap(), Some(json!({"v": 1})));
        assert!(backend.exists("k").await.unwrap());

        backend.delete("k").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn positive_ttl_expires_lazily_on_read() {
        let backend = backend().await;
        backend.set("k", &json!("value"), 60).await.unwrap();
        assert!(backend.exists("k").await.unwrap());

        backdate(&backend, "k", 61).await;
        // No sweep has run; the read itself must reject the stale row.
        assert_eq!(backend.get("k").await.unwrap(), None);
        // And the lazy path deleted it.
        assert_eq!(backend.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn exists_rejects_expired_rows() {
        let backend = backend().await;
        backend.set("k", &json!(1), 30).await.unwrap();
        backdate(&backend, "k", 31).await;
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn sweep_removes_only_elapsed_rows() {
        let backend = backend().await;
        backend.set("stale", &json!(1), 10).await.unwrap();
        backend.set("fresh", &json!(2), 3600).await.unwrap();
        backend.set("pinned", &json!(3), 0).await.unwrap();
        backdate(&backend, "stale", 11).await;

        let removed = backend.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.get("stale").await.unwrap(), None);
        assert_eq!(backend.get("fresh").await.unwrap(), Some(json!(2)));
        assert_eq!(backend.get("pinned").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn set_replaces_existing_entry() {
        let backend = backend().await;
        backend.set("k", &json!("old"), 0).await.unwrap();
        backend.set("k", &json!("new"), 60).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(json!("new")));
        assert_eq!(backend.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let backend = backend().await;
        backend.delete("never-set").await.unwrap();
    }
}
