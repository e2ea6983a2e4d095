//! Cache execution engine.
//!
//! Given a key source and a producer, either serve the value from the
//! resolved store or run the producer and store its result. The directive is
//! resolved here, at execution time, and nowhere earlier.
//!
//! # Guarantees
//!
//! With caching enabled each call performs exactly one store read and at
//! most one store write; the producer runs once on a miss and never on a
//! hit. With caching disabled the store is not touched and the producer runs
//! once.
//!
//! Store failures propagate. There is no fallback to uncached execution, so
//! caching-on and caching-off behave observably differently when a store is
//! down.

use std::future::Future;
use std::sync::Arc;

use cachet_core::{
    CacheDirective, CacheError, CacheSettings, CachetResult, EntityDescriptor, Expiry,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::CacheKey;
use super::registry::StoreRegistry;

/// Inputs a cache key is derived from.
#[derive(Debug, Clone, Copy)]
pub struct KeySource<'a> {
    /// Entity the key is namespaced under.
    pub entity: &'a EntityDescriptor,
    /// Caller-supplied key. Wins over `canonical` unless empty.
    pub explicit: Option<&'a str>,
    /// Canonical text of the query being executed.
    pub canonical: &'a str,
    /// Tags appended to the key.
    pub tags: &'a [String],
}

impl<'a> KeySource<'a> {
    pub fn new(entity: &'a EntityDescriptor, canonical: &'a str, tags: &'a [String]) -> Self {
        Self {
            entity,
            explicit: None,
            canonical,
            tags,
        }
    }

    pub fn with_explicit(mut self, key: Option<&'a str>) -> Self {
        self.explicit = key;
        self
    }

    /// The string that gets hashed: the explicit key when one was given and
    /// is non-empty, the canonical query text otherwise.
    pub fn basis(&self) -> &'a str {
        match self.explicit {
            Some(key) if !key.trim().is_empty() => key,
            _ => self.canonical,
        }
    }
}

/// Runs producers through the configured cache stores.
///
/// Cheap to clone; clones share the store registry and settings.
#[derive(Debug, Clone)]
pub struct CacheExecutor {
    stores: Arc<StoreRegistry>,
    settings: Arc<CacheSettings>,
}

impl CacheExecutor {
    pub fn new(stores: StoreRegistry, settings: CacheSettings) -> Self {
        Self {
            stores: Arc::new(stores),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn stores(&self) -> &StoreRegistry {
        &self.stores
    }

    /// Key that `source` maps to under the configured salt.
    pub fn key_for(&self, source: &KeySource<'_>) -> CacheKey {
        CacheKey::derive(
            source.entity,
            source.basis(),
            source.tags,
            &self.settings.key_salt,
        )
    }

    /// Serve from cache or run `producer` and cache its result.
    pub async fn execute<T, F, Fut>(
        &self,
        directive: &CacheDirective,
        source: KeySource<'_>,
        producer: F,
    ) -> CachetResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CachetResult<T>>,
    {
        let Some(resolved) = directive.resolve(&self.settings)? else {
            tracing::debug!(entity = %source.entity, "cache bypassed");
            return producer().await;
        };

        let key = self.key_for(&source);
        let store = self.stores.get(&resolved.engine)?;

        if let Some(bytes) = store.get(&key).await? {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                tracing::warn!(engine = %resolved.engine, key = %key, error = %e, "cached payload failed to decode");
                CacheError::Serialization {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            })?;
            tracing::debug!(engine = %resolved.engine, key = %key, "cache hit");
            return Ok(value);
        }

        tracing::debug!(engine = %resolved.engine, key = %key, "cache miss");
        let value = producer().await?;

        let bytes = serde_json::to_vec(&value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        match resolved.expiry {
            Expiry::After(ttl) if ttl.is_zero() => {
                tracing::debug!(engine = %resolved.engine, key = %key, "ttl elapsed, result not stored");
            }
            Expiry::After(ttl) => {
                store.put_for(&key, bytes, ttl).await?;
                tracing::debug!(engine = %resolved.engine, key = %key, ttl_secs = ttl.as_secs(), "cached");
            }
            Expiry::Never => {
                store.put_forever(&key, bytes).await?;
                tracing::debug!(engine = %resolved.engine, key = %key, "cached forever");
            }
        }

        Ok(value)
    }

    /// Remove the entry `source` maps to from the resolved store.
    ///
    /// Returns `false` without touching any store when caching is disabled.
    pub async fn forget(
        &self,
        directive: &CacheDirective,
        source: KeySource<'_>,
    ) -> CachetResult<bool> {
        if !directive.resolved_enabled(&self.settings) {
            return Ok(false);
        }
        let key = self.key_for(&source);
        let store = self.stores.get(directive.resolved_engine(&self.settings))?;
        let removed = store.forget(&key).await?;
        tracing::debug!(key = %key, removed, "cache entry forgotten");
        Ok(removed)
    }
}
