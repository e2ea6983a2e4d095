//! In-process cache store.
//!
//! A `HashMap` behind a tokio `RwLock`, with lazy expiry of timed entries.
//! Suitable for tests, single-process deployments and as the default
//! engine; it is not shared between processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cachet_core::CachetResult;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::key::CacheKey;
use super::traits::{CacheStats, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory cache engine.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Remove everything.
    pub async fn flush(&self) {
        self.entries.write().await.clear();
    }

    /// Remove `key` only if it is still expired as of `now`. An entry
    /// rewritten after the caller's read is kept.
    async fn evict_if_expired(&self, key: &CacheKey, now: Instant) -> bool {
        let mut entries = self.entries.write().await;
        if entries.get(key.as_str()).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key.as_str());
            return true;
        }
        false
    }

    async fn insert(&self, key: &CacheKey, value: Vec<u8>, expires_at: Option<Instant>) {
        self.entries
            .write()
            .await
            .insert(key.as_str().to_string(), Entry { value, expires_at });
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> CachetResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let found = {
            let entries = self.entries.read().await;
            entries.get(key.as_str()).cloned()
        };

        match found {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value))
            }
            Some(_) => {
                self.evict_if_expired(key, now).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %key, "memory store entry expired");
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put_for(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> CachetResult<()> {
        self.insert(key, value, Some(Instant::now() + ttl)).await;
        Ok(())
    }

    async fn put_forever(&self, key: &CacheKey, value: Vec<u8>) -> CachetResult<()> {
        self.insert(key, value, None).await;
        Ok(())
    }

    async fn forget(&self, key: &CacheKey) -> CachetResult<bool> {
        Ok(self.entries.write().await.remove(key.as_str()).is_some())
    }

    async fn stats(&self) -> CachetResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entry_count: self.len().await as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::EntityDescriptor;

    fn key(basis: &str) -> CacheKey {
        let entity = EntityDescriptor::parse("Order").unwrap();
        CacheKey::derive::<&str>(&entity, basis, &[], "")
    }

    #[tokio::test]
    async fn test_get_missing_is_miss() {
        let store = MemoryStore::new();
        assert_eq!(store.get(&key("a")).await.unwrap(), None);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_put_forever_then_get() {
        let store = MemoryStore::new();
        store.put_forever(&key("a"), b"payload".to_vec()).await.unwrap();

        assert_eq!(store.get(&key("a")).await.unwrap(), Some(b"payload".to_vec()));
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_entry_expires() {
        let store = MemoryStore::new();
        store
            .put_for(&key("a"), b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get(&key("a")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get(&key("a")).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store
            .put_for(&key("short"), b"v".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        store.put_forever(&key("long"), b"v".to_vec()).await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_eviction_keeps_rewritten_entry() {
        let store = MemoryStore::new();
        store
            .put_for(&key("a"), b"stale".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        // A reader saw the stale entry at `seen`, then a writer got in first
        let seen = Instant::now();
        store
            .put_for(&key("a"), b"fresh".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!store.evict_if_expired(&key("a"), seen).await);
        assert_eq!(store.get(&key("a")).await.unwrap(), Some(b"fresh".to_vec()));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.evict_if_expired(&key("a"), Instant::now()).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_forget_and_flush() {
        let store = MemoryStore::new();
        store.put_forever(&key("a"), b"v".to_vec()).await.unwrap();
        store.put_forever(&key("b"), b"v".to_vec()).await.unwrap();

        assert!(store.forget(&key("a")).await.unwrap());
        assert!(!store.forget(&key("a")).await.unwrap());

        store.flush().await;
        assert!(store.is_empty().await);
    }
}
