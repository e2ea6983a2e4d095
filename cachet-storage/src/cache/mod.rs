//! Cache layer: keys, stores and the execution engine.
//!
//! # Flow
//!
//! A repository hands the engine a [`KeySource`] (entity, canonical query
//! text or explicit key, tags) and a producer. The engine resolves the
//! caller's [`CacheDirective`](cachet_core::CacheDirective) against the
//! process settings, derives a [`CacheKey`], and talks to the named
//! [`CacheStore`] picked from the [`StoreRegistry`].
//!
//! # Example
//!
//! ```ignore
//! let executor = CacheExecutor::new(
//!     StoreRegistry::new().with_store("memory", Arc::new(MemoryStore::new())),
//!     CacheSettings::default(),
//! );
//!
//! let mut directive = CacheDirective::new();
//! directive.remember(Some(Duration::from_secs(60).into()));
//!
//! let rows: Vec<Order> = executor
//!     .execute(&directive, KeySource::new(&entity, &sql, &tags), || fetch(&sql))
//!     .await?;
//! ```

pub mod executor;
pub mod key;
pub mod memory;
pub mod registry;
pub mod traits;

pub use executor::{CacheExecutor, KeySource};
pub use key::CacheKey;
pub use memory::MemoryStore;
pub use registry::StoreRegistry;
pub use traits::{CacheStats, CacheStore};
