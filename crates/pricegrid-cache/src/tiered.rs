//! Composition of the fast and durable tiers.
//!
//! Reads try the fast tier first and fall through to the durable tier on a
//! miss; durable hits are NOT promoted back into the fast tier, since
//! fast-tier entries already carry their own expiry natively. Writes with a
//! positive TTL land in the fast tier when one is configured; the durable
//! tier is the baseline path otherwise. Deletes hit both tiers
//! unconditionally. Every operation is fail-soft: backend errors are logged
//! and reported as a miss/no-op, never propagated — the cache must not be a
//! single point of failure for the pipeline.

use serde_json::Value;

use crate::backend::CacheBackend;
use crate::memory::MemoryBackend;
use crate::sqlite::SqliteBackend;

/// The concrete cache used by the product pipeline.
pub type ProductCache = TieredCache<MemoryBackend, SqliteBackend>;

pub struct TieredCache<F, D> {
    fast: Option<F>,
    durable: D,
}

impl<F: CacheBackend, D: CacheBackend> TieredCache<F, D> {
    pub fn new(fast: Option<F>, durable: D) -> Self {
        Self { fast, durable }
    }

    #[must_use]
    pub fn fast(&self) -> Option<&F> {
        self.fast.as_ref()
    }

    #[must_use]
    pub fn durable(&self) -> &D {
        &self.durable
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(fast) = &self.fast {
            match fast.get(key).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key, error = %e, "fast cache tier get failed; trying durable tier");
                }
            }
        }

        match self.durable.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "durable cache tier get failed; treating as miss");
                None
            }
        }
    }

    /// Returns `false` when neither tier accepted the write.
    pub async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        if ttl_seconds > 0 {
            if let Some(fast) = &self.fast {
                match fast.set(key, value, ttl_seconds).await {
                    Ok(()) => return true,
                    Err(e) => {
                        tracing::warn!(key, error = %e, "fast cache tier set failed; falling back to durable tier");
                    }
                }
            }
        }

        match self.durable.set(key, value, ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "durable cache tier set failed; entry not cached");
                false
            }
        }
    }

    /// Removes the key from both tiers. Returns `false` if either tier errored.
    pub async fn delete(&self, key: &str) -> bool {
        let mut ok = true;

        if let Some(fast) = &self.fast {
            if let Err(e) = fast.delete(key).await {
                tracing::warn!(key, error = %e, "fast cache tier delete failed");
                ok = false;
            }
        }

        if let Err(e) = self.durable.delete(key).await {
            tracing::warn!(key, error = %e, "durable cache tier delete failed");
            ok = false;
        }

        ok
    }

    pub async fn exists(&self, key: &str) -> bool {
        if let Some(fast) = &self.fast {
            match fast.exists(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key, error = %e, "fast cache tier exists failed; trying durable tier");
                }
            }
        }

        match self.durable.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, error = %e, "durable cache tier exists failed; treating as absent");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::CacheError;

    /// A tier that is permanently unreachable.
    struct BrokenBackend;

    fn broken_error() -> CacheError {
        CacheError::Sqlx(sqlx::Error::PoolClosed)
    }

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Err(broken_error())
        }
        async fn set(&self, _key: &str, _value: &Value, _ttl: u64) -> Result<(), CacheError> {
            Err(broken_error())
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(broken_error())
        }
        async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
            Err(broken_error())
        }
        async fn entry_count(&self) -> Result<u64, CacheError> {
            Err(broken_error())
        }
    }

    #[tokio::test]
    async fn positive_ttl_write_lands_in_fast_tier_only() {
        let cache = TieredCache::new(Some(MemoryBackend::new()), MemoryBackend::new());
        assert!(cache.set("k", &json!(1), 60).await);

        assert_eq!(cache.fast().unwrap().get("k").await.unwrap(), Some(json!(1)));
        assert_eq!(cache.durable().get("k").await.unwrap(), None);
        assert_eq!(cache.get("k").await, Some(json!(1)));
    }

    #[tokio::test]
    async fn zero_ttl_write_lands_in_durable_tier() {
        let cache = TieredCache::new(Some(MemoryBackend::new()), MemoryBackend::new());
        assert!(cache.set("k", &json!("pinned"), 0).await);

        assert_eq!(cache.fast().unwrap().get("k").await.unwrap(), None);
        assert_eq!(cache.durable().get("k").await.unwrap(), Some(json!("pinned")));
        assert_eq!(cache.get("k").await, Some(json!("pinned")));
    }

    #[tokio::test]
    async fn absent_fast_tier_uses_durable_baseline() {
        let cache: TieredCache<MemoryBackend, _> = TieredCache::new(None, MemoryBackend::new());
        assert!(cache.set("k", &json!(2), 60).await);
        assert_eq!(cache.durable().get("k").await.unwrap(), Some(json!(2)));
        assert_eq!(cache.get("k").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn broken_fast_tier_degrades_to_durable() {
        let cache = TieredCache::new(Some(BrokenBackend), MemoryBackend::new());
        // The fast write fails, so the entry falls through to the durable tier.
        assert!(cache.set("k", &json!(3), 60).await);
        assert_eq!(cache.get("k").await, Some(json!(3)));
        assert!(cache.exists("k").await);
    }

    #[tokio::test]
    async fn fully_broken_cache_is_a_miss_not_an_error() {
        let cache = TieredCache::new(Some(BrokenBackend), BrokenBackend);
        assert!(!cache.set("k", &json!(4), 60).await);
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.exists("k").await);
        assert!(!cache.delete("k").await);
    }

    #[tokio::test]
    async fn delete_clears_both_tiers() {
        let cache = TieredCache::new(Some(MemoryBackend::new()), MemoryBackend::new());
        cache.set("short", &json!(1), 60).await;
        cache.set("pinned", &json!(2), 0).await;

        assert!(cache.delete("short").await);
        assert!(cache.delete("pinned").await);
        assert_eq!(cache.get("short").await, None);
        assert_eq!(cache.get("pinned").await, None);
    }
}
