//! Error types for Cachet operations

use thiserror::Error;

/// Configuration errors.
///
/// Raised at repository construction or when settings are validated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No entity configured for repository")]
    MissingEntity,

    #[error("Invalid entity reference '{path}': {reason}")]
    InvalidEntity { path: String, reason: String },

    #[error("Entity kind mismatch: expected {expected}, builder yields {got}")]
    EntityKindMismatch { expected: String, got: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Cache directive and cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unrecognized remember mode: {mode}")]
    InvalidMode { mode: String },

    #[error("Caching is enabled but no remember mode was selected")]
    ModeNotSelected,

    #[error("Cache store {engine} failed: {reason}")]
    Backend { engine: String, reason: String },

    #[error("Cache store not registered: {engine}")]
    UnknownEngine { engine: String },

    #[error("Cached payload for {key} could not be encoded or decoded: {reason}")]
    Serialization { key: String, reason: String },
}

/// Query building and dispatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Operation {operation} did not yield a query: {reason}")]
    InvalidQueryResult { operation: String, reason: String },

    #[error("Unknown operation '{operation}' on {entity}")]
    UnknownOperation { operation: String, entity: String },

    #[error("Operation {operation} failed: {reason}")]
    ExecutionFailed { operation: String, reason: String },
}

/// Master error type for all Cachet errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CachetError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),
}

impl CachetError {
    /// True when the error came from a cache store rather than from the
    /// directive or the query.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            CachetError::Cache(
                CacheError::Backend { .. }
                    | CacheError::UnknownEngine { .. }
                    | CacheError::Serialization { .. }
            )
        )
    }

    /// True for both an unrecognized and a missing remember mode.
    pub fn is_invalid_mode(&self) -> bool {
        matches!(
            self,
            CachetError::Cache(CacheError::InvalidMode { .. } | CacheError::ModeNotSelected)
        )
    }
}

/// Result type alias for Cachet operations.
pub type CachetResult<T> = Result<T, CachetError>;

// =============================================================================
// TESTS
// =============================================================================
