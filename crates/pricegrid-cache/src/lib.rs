//! Tiered key/value cache with TTL expiry.
//!
//! Two backends sit behind one [`CacheBackend`] capability: an optional fast
//! in-memory tier with native expiry, and a mandatory durable SQLite tier
//! whose expired rows are reaped by an active sweep and rejected lazily on
//! read. [`TieredCache`] composes the two and encodes only the fallback
//! order; every operation is fail-soft, so a broken backend degrades to a
//! cache miss rather than an error.

mod backend;
mod error;
mod key;
mod memory;
mod sqlite;
mod tiered;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::cache_key;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use tiered::{ProductCache, TieredCache};
