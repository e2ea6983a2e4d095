//! Named cache engines.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cachet_core::{CacheError, CachetResult};

use super::traits::CacheStore;

/// Registry of cache engines selectable by name at runtime.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<String, Arc<dyn CacheStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`, replacing any previous engine.
    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn CacheStore>) {
        self.stores.insert(name.into(), store);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_store(mut self, name: impl Into<String>, store: Arc<dyn CacheStore>) -> Self {
        self.register(name, store);
        self
    }

    /// Look up an engine. Unknown names are a backend error.
    pub fn get(&self, name: &str) -> CachetResult<Arc<dyn CacheStore>> {
        self.stores.get(name).cloned().ok_or_else(|| {
            CacheError::UnknownEngine {
                engine: name.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered engine names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}
