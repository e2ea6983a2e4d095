//! Cachet Core - shared types
//!
//! Entity descriptors, canonical query text, cache directives, process-wide
//! settings and the error taxonomy. Every other Cachet crate depends on this
//! one; it performs no I/O.

pub mod canonical;
pub mod config;
pub mod directive;
pub mod entity;
pub mod error;

pub use canonical::{canonical_arguments, canonical_json, CanonicalQuery, Clause};
pub use config::{CacheSettings, DEFAULT_DURATION, DEFAULT_ENGINE};
pub use directive::{CacheDirective, CacheDuration, Expiry, RememberMode, ResolvedDirective};
pub use entity::{Entity, EntityDescriptor};
pub use error::{CacheError, CachetError, CachetResult, ConfigError, QueryError};
