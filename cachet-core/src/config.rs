//! Process-wide cache settings.
//!
//! Settings are injected into every cache executor explicitly. Per-call
//! directives take precedence over them, and `force_disable` overrides both.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CachetResult, ConfigError};

/// Engine name used when nothing else is configured.
pub const DEFAULT_ENGINE: &str = "memory";

/// Default lifetime of a timed cache entry (1000 seconds).
pub const DEFAULT_DURATION: Duration = Duration::from_secs(1000);

/// Process-wide defaults consulted when a directive leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache query results when the caller did not say either way.
    pub default_enabled: bool,

    /// Lifetime of timed entries when the caller gave no duration.
    #[serde(with = "duration_secs")]
    pub default_duration: Duration,

    /// Store used when the caller selected none.
    pub default_engine: String,

    /// Disable caching for every repository, whatever the caller asked for.
    pub force_disable: bool,

    /// Application secret mixed into every hashed key.
    pub key_salt: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_enabled: false,
            default_duration: DEFAULT_DURATION,
            default_engine: DEFAULT_ENGINE.to_string(),
            force_disable: false,
            key_salt: String::new(),
        }
    }
}

impl CacheSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings from environment variables.
    ///
    /// Environment variables:
    /// - `CACHET_CACHE_DEFAULT`: "true" or "false" (default: false)
    /// - `CACHET_CACHE_DURATION_SECS`: Timed entry lifetime (default: 1000)
    /// - `CACHET_CACHE_ENGINE`: Default store name (default: "memory")
    /// - `CACHET_CACHE_FORCE_DISABLE`: "true" or "false" (default: false)
    /// - `CACHET_KEY_SALT`: Secret mixed into hashed keys (default: empty)
    pub fn from_env() -> CachetResult<Self> {
        let default_enabled = std::env::var("CACHET_CACHE_DEFAULT")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let default_duration = match std::env::var("CACHET_CACHE_DURATION_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "CACHET_CACHE_DURATION_SECS".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(_) => DEFAULT_DURATION,
        };

        let default_engine = std::env::var("CACHET_CACHE_ENGINE")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string());

        let force_disable = std::env::var("CACHET_CACHE_FORCE_DISABLE")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let key_salt = std::env::var("CACHET_KEY_SALT").unwrap_or_default();

        let settings = Self {
            default_enabled,
            default_duration,
            default_engine,
            force_disable,
            key_salt,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that can never produce a usable cache call.
    pub fn validate(&self) -> CachetResult<()> {
        if self.default_engine.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_engine".to_string(),
                value: self.default_engine.clone(),
                reason: "engine name must not be empty".to_string(),
            }
            .into());
        }
        if self.default_duration.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_duration".to_string(),
                value: "0".to_string(),
                reason: "default duration must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn with_default_engine(mut self, engine: impl Into<String>) -> Self {
        self.default_engine = engine.into();
        self
    }

    pub fn with_force_disable(mut self, force_disable: bool) -> Self {
        self.force_disable = force_disable;
        self
    }

    pub fn with_key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = salt.into();
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
