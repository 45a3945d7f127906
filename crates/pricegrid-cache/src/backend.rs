use async_trait::async_trait;
use serde_json::Value;

use crate::error::CacheError;

/// One cache tier: a key/value store over JSON documents with per-entry TTL.
///
/// `ttl_seconds == 0` means "no expiry". Implementations own their expiry
/// mechanics; callers must never observe a value whose TTL has elapsed.
/// Deleting an absent key is not an error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a key. Expired entries are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backing store is unreachable or the
    /// stored document does not parse.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Store a value, replacing any previous entry under the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backing store rejects the write.
    async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Remove a key. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backing store is unreachable.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Whether a live (non-expired) entry exists under the key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backing store is unreachable.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Number of live entries, for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backing store is unreachable.
    async fn entry_count(&self) -> Result<u64, CacheError>;
}
