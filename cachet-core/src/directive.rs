//! Per-repository cache directive.
//!
//! Callers accumulate their caching preferences on a [`CacheDirective`]
//! while they build a query. Nothing is read until execution time, when
//! [`CacheDirective::resolve`] folds the directive over the process-wide
//! [`CacheSettings`].
//!
//! Precedence: per-call value > process default, and `force_disable`
//! overrides any per-call request to cache.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CacheError, CacheSettings, CachetError, CachetResult};

/// Whether a cached value expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RememberMode {
    /// Expires after the resolved duration
    Timed,
    /// Never expires
    Forever,
}

impl RememberMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RememberMode::Timed => "remember",
            RememberMode::Forever => "remember_forever",
        }
    }
}

impl fmt::Display for RememberMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RememberMode {
    type Err = CachetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "remember" | "timed" => Ok(RememberMode::Timed),
            "rememberForever" | "remember_forever" | "forever" => Ok(RememberMode::Forever),
            other => Err(CacheError::InvalidMode {
                mode: other.to_string(),
            }
            .into()),
        }
    }
}

/// How long a timed entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDuration {
    /// Fixed lifetime from the moment of the write
    For(Duration),
    /// Lives until an absolute deadline
    Until(DateTime<Utc>),
}

impl CacheDuration {
    /// Lifetime remaining at `now`. Past deadlines give zero.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        match self {
            CacheDuration::For(duration) => *duration,
            CacheDuration::Until(deadline) => deadline
                .signed_duration_since(now)
                .to_std()
                .unwrap_or(Duration::ZERO),
        }
    }
}

impl From<Duration> for CacheDuration {
    fn from(duration: Duration) -> Self {
        CacheDuration::For(duration)
    }
}

impl From<DateTime<Utc>> for CacheDuration {
    fn from(deadline: DateTime<Utc>) -> Self {
        CacheDuration::Until(deadline)
    }
}

/// Expiry policy of one cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    After(Duration),
    Never,
}

/// A directive with every field resolved. Produced only when caching is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirective {
    pub engine: String,
    pub mode: RememberMode,
    pub expiry: Expiry,
}

/// Caller's caching preferences. Unset fields fall back to settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirective {
    enabled: Option<bool>,
    engine: Option<String>,
    mode: Option<RememberMode>,
    duration: Option<CacheDuration>,
}

impl CacheDirective {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly turn caching on or off for this repository.
    pub fn use_cache(&mut self, enabled: bool) -> &mut Self {
        self.enabled = Some(enabled);
        self
    }

    /// Turn caching on with the given mode, or off.
    pub fn use_cache_as(&mut self, enabled: bool, mode: RememberMode) -> &mut Self {
        if enabled {
            match mode {
                RememberMode::Timed => self.remember(None),
                RememberMode::Forever => self.remember_forever(),
            }
        } else {
            self.use_cache(false)
        }
    }

    /// Select the cache store. `None` or an empty name clears the override.
    pub fn with_store(&mut self, engine: Option<&str>) -> &mut Self {
        self.engine = engine
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        self.enabled = Some(true);
        self
    }

    /// Cache for `duration`, or for the configured default when `None`.
    pub fn remember(&mut self, duration: Option<CacheDuration>) -> &mut Self {
        if duration.is_some() {
            self.duration = duration;
        }
        self.mode = Some(RememberMode::Timed);
        self.enabled = Some(true);
        self
    }

    /// Cache without expiry.
    pub fn remember_forever(&mut self) -> &mut Self {
        self.mode = Some(RememberMode::Forever);
        self.enabled = Some(true);
        self
    }

    pub fn resolved_enabled(&self, settings: &CacheSettings) -> bool {
        self.enabled.unwrap_or(settings.default_enabled) && !settings.force_disable
    }

    pub fn resolved_engine<'a>(&'a self, settings: &'a CacheSettings) -> &'a str {
        self.engine.as_deref().unwrap_or(&settings.default_engine)
    }

    pub fn resolved_duration(&self, settings: &CacheSettings) -> Duration {
        self.resolved_duration_at(settings, Utc::now())
    }

    pub fn resolved_duration_at(&self, settings: &CacheSettings, now: DateTime<Utc>) -> Duration {
        self.duration
            .map(|d| d.remaining_at(now))
            .unwrap_or(settings.default_duration)
    }

    /// Last mode selected. Errors when none was ever selected.
    pub fn resolved_mode(&self) -> CachetResult<RememberMode> {
        self.mode.ok_or_else(|| CacheError::ModeNotSelected.into())
    }

    /// Resolve against `settings`. `None` means bypass the cache entirely.
    pub fn resolve(&self, settings: &CacheSettings) -> CachetResult<Option<ResolvedDirective>> {
        self.resolve_at(settings, Utc::now())
    }

    pub fn resolve_at(
        &self,
        settings: &CacheSettings,
        now: DateTime<Utc>,
    ) -> CachetResult<Option<ResolvedDirective>> {
        if !self.resolved_enabled(settings) {
            return Ok(None);
        }

        let mode = self.resolved_mode()?;
        let expiry = match mode {
            RememberMode::Timed => Expiry::After(self.resolved_duration_at(settings, now)),
            RememberMode::Forever => Expiry::Never,
        };

        Ok(Some(ResolvedDirective {
            engine: self.resolved_engine(settings).to_string(),
            mode,
            expiry,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> CacheSettings {
        CacheSettings::default()
    }

    #[test]
    fn test_untouched_directive_uses_default_enabled() {
        let directive = CacheDirective::new();
        assert!(!directive.resolved_enabled(&settings()));
        assert!(directive.resolved_enabled(&settings().with_default_enabled(true)));
    }

    #[test]
    fn test_explicit_override_beats_default() {
        let mut directive = CacheDirective::new();
        directive.use_cache(false);
        assert!(!directive.resolved_enabled(&settings().with_default_enabled(true)));

        directive.use_cache(true);
        assert!(directive.resolved_enabled(&settings()));
    }

    #[test]
    fn test_force_disable_wins() {
        let forced = settings().with_default_enabled(true).with_force_disable(true);
        let mut directive = CacheDirective::new();
        directive.use_cache(true).remember_forever();
        assert!(!directive.resolved_enabled(&forced));
        assert_eq!(directive.resolve(&forced).unwrap(), None);
    }

    #[test]
    fn test_with_store_override_and_clear() {
        let mut directive = CacheDirective::new();
        directive.with_store(Some("redis"));
        assert_eq!(directive.resolved_engine(&settings()), "redis");

        directive.with_store(Some(""));
        assert_eq!(directive.resolved_engine(&settings()), "memory");

        directive.with_store(Some("redis")).with_store(None);
        assert_eq!(directive.resolved_engine(&settings()), "memory");
    }

    #[test]
    fn test_remember_without_duration_falls_back() {
        let mut directive = CacheDirective::new();
        directive.remember(None);
        assert_eq!(directive.resolved_duration(&settings()), Duration::from_secs(1000));

        directive.remember(Some(Duration::from_secs(60).into()));
        assert_eq!(directive.resolved_duration(&settings()), Duration::from_secs(60));

        // A later remember() without a duration keeps the earlier override
        directive.remember(None);
        assert_eq!(directive.resolved_duration(&settings()), Duration::from_secs(60));
    }

    #[test]
    fn test_remember_until_deadline() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap();

        let mut directive = CacheDirective::new();
        directive.remember(Some(deadline.into()));
        assert_eq!(
            directive.resolved_duration_at(&settings(), now),
            Duration::from_secs(300)
        );

        let later = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        assert_eq!(directive.resolved_duration_at(&settings(), later), Duration::ZERO);
    }

    #[test]
    fn test_last_mode_wins() {
        let mut directive = CacheDirective::new();
        directive.remember(None).remember_forever();
        assert_eq!(directive.resolved_mode().unwrap(), RememberMode::Forever);

        directive.remember(None);
        assert_eq!(directive.resolved_mode().unwrap(), RememberMode::Timed);
    }

    #[test]
    fn test_enabled_without_mode_is_invalid() {
        let mut directive = CacheDirective::new();
        directive.use_cache(true);
        let err = directive.resolve(&settings()).unwrap_err();
        assert_eq!(err, CachetError::Cache(CacheError::ModeNotSelected));
    }

    #[test]
    fn test_disabled_without_mode_is_fine() {
        let directive = CacheDirective::new();
        assert_eq!(directive.resolve(&settings()).unwrap(), None);
    }

    #[test]
    fn test_with_store_alone_requires_mode() {
        let mut directive = CacheDirective::new();
        directive.with_store(Some("redis"));
        assert!(directive.resolve(&settings()).unwrap_err().is_invalid_mode());
    }

    #[test]
    fn test_resolve_timed_and_forever() {
        let mut directive = CacheDirective::new();
        directive.with_store(Some("redis")).remember(Some(Duration::from_secs(60).into()));
        let resolved = directive.resolve(&settings()).unwrap().unwrap();
        assert_eq!(resolved.engine, "redis");
        assert_eq!(resolved.mode, RememberMode::Timed);
        assert_eq!(resolved.expiry, Expiry::After(Duration::from_secs(60)));

        directive.remember_forever();
        let resolved = directive.resolve(&settings()).unwrap().unwrap();
        assert_eq!(resolved.expiry, Expiry::Never);
    }

    #[test]
    fn test_use_cache_as() {
        let mut directive = CacheDirective::new();
        directive.use_cache_as(true, RememberMode::Forever);
        assert_eq!(directive.resolved_mode().unwrap(), RememberMode::Forever);
        assert!(directive.resolved_enabled(&settings()));

        directive.use_cache_as(false, RememberMode::Timed);
        assert!(!directive.resolved_enabled(&settings()));
        // Disabling does not touch the mode
        assert_eq!(directive.resolved_mode().unwrap(), RememberMode::Forever);
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("remember".parse::<RememberMode>().unwrap(), RememberMode::Timed);
        assert_eq!("rememberForever".parse::<RememberMode>().unwrap(), RememberMode::Forever);
        assert_eq!("forever".parse::<RememberMode>().unwrap(), RememberMode::Forever);

        let err = "sometimes".parse::<RememberMode>().unwrap_err();
        assert_eq!(
            err,
            CachetError::Cache(CacheError::InvalidMode {
                mode: "sometimes".to_string()
            })
        );
    }
}
