//! Cachet Storage - cache stores and the execution engine
//!
//! Defines the store abstraction the query cache runs on, the in-process
//! [`MemoryStore`], and the [`CacheExecutor`] that decides between a cache
//! hit and running the query.

pub mod cache;

pub use cache::{
    CacheExecutor, CacheKey, CacheStats, CacheStore, KeySource, MemoryStore, StoreRegistry,
};
