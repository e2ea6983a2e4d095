//! Cache store trait.
//!
//! The execution engine needs only simple request/response calls from a
//! store: read, write with a lifetime, write without one. Stores hold
//! opaque bytes; the engine owns serialization.

use std::time::Duration;

use async_trait::async_trait;
use cachet_core::CachetResult;

use super::key::CacheKey;

/// A named key-value cache engine.
///
/// Implementations must be thread-safe: one store is shared by every
/// repository in the process. Failures must be reported as
/// `CacheError::Backend` so callers can tell them apart from query errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the payload stored under `key`, if present and not expired.
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn put_for(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> CachetResult<()>;

    /// Store `value` under `key` with no expiry.
    async fn put_forever(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()>;

    /// Remove `key`. Returns whether an entry was removed.
    async fn forget(&self, key: &CacheKey) -> CachetResult<bool>;

    /// Usage counters.
    async fn stats(&self) -> CachetResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of writes, timed or forever.
    pub writes: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of reads.
    pub fn reads(&self) -> u64 {
        self.hits + self.misses
    }
}
