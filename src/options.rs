//! Rate limiter configuration.
//!
//! `Options` describes a single quota: how many points may be consumed
//! over what duration, which admission-control strategy enforces it, and
//! where its state lives. Construction goes through `OptionsBuilder`,
//! which validates before returning, mirroring the `quota.rs` builder
//! pattern this crate grew out of.

use std::time::Duration;

use crate::error::ConfigError;

/// Admission-control algorithm used to enforce a quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Bursty traffic with a continuously refilling token pool.
    TokenBucket,
    /// Smooths traffic to a constant drain rate; no burst.
    LeakyBucket,
    /// Exact request-timestamp tracking over a rolling window.
    SlidingWindow,
    /// Fixed-size aligned windows with a simple counter.
    FixedWindow,
}

/// Which storage backend holds rate limit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    /// In-process, per-instance storage.
    Memory,
    /// Redis-like remote store.
    Redis,
    /// Memcached-like remote store.
    Memcached,
}

/// Validated configuration for a `RateLimiter`.
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) points: u64,
    pub(crate) duration: Duration,
    pub(crate) strategy: Strategy,
    pub(crate) block_duration: Duration,
    pub(crate) key_prefix: String,
    pub(crate) store_type: Option<StoreType>,
}

impl Options {
    /// Start building a new set of options.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Maximum points consumable per `duration`.
    pub fn points(&self) -> u64 {
        self.points
    }

    /// Length of the quota window.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Strategy enforcing this quota.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Duration an explicit `block` call applies, when the caller passes zero.
    pub fn block_duration(&self) -> Duration {
        if self.block_duration.is_zero() {
            self.duration
        } else {
            self.block_duration
        }
    }

    /// Prefix prepended to every storage key.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Explicit backend selection, if any (`None` means auto-detect).
    pub fn store_type(&self) -> Option<StoreType> {
        self.store_type
    }
}

/// Builder for `Options`, validating on `build()`.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    points: Option<u64>,
    duration: Option<Duration>,
    strategy: Strategy,
    block_duration: Duration,
    key_prefix: String,
    store_type: Option<StoreType>,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionsBuilder {
    /// Create a new builder with the engine's defaults.
    pub fn new() -> Self {
        Self {
            points: None,
            duration: None,
            strategy: Strategy::TokenBucket,
            block_duration: Duration::ZERO,
            key_prefix: "rl".to_string(),
            store_type: None,
        }
    }

    /// Set the quota's point allowance. Must be greater than zero.
    pub fn points(mut self, points: u64) -> Self {
        self.points = Some(points);
        self
    }

    /// Set the quota window. Must be non-zero.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set the enforcing strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the duration an explicit `block` call applies by default.
    pub fn block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = duration;
        self
    }

    /// Set the key prefix. Must be non-empty.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Force a specific storage backend instead of auto-detection.
    pub fn store_type(mut self, store_type: StoreType) -> Self {
        self.store_type = Some(store_type);
        self
    }

    /// Validate and produce `Options`.
    pub fn build(self) -> Result<Options, ConfigError> {
        let points = self
            .points
            .ok_or_else(|| ConfigError::MissingRequired("points".into()))?;
        if points == 0 {
            return Err(ConfigError::InvalidQuota(
                "points must be greater than zero".into(),
            ));
        }

        let duration = self
            .duration
            .ok_or_else(|| ConfigError::MissingRequired("duration".into()))?;
        if duration.is_zero() {
            return Err(ConfigError::InvalidQuota(
                "duration must be greater than zero".into(),
            ));
        }

        if self.key_prefix.is_empty() {
            return Err(ConfigError::InvalidQuota(
                "key_prefix must not be empty".into(),
            ));
        }

        Ok(Options {
            points,
            duration,
            strategy: self.strategy,
            block_duration: self.block_duration,
            key_prefix: self.key_prefix,
            store_type: self.store_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_points_and_duration() {
        let err = Options::builder()
            .duration(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));

        let err = Options::builder().points(10).build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }

    #[test]
    fn build_rejects_zero_points_or_duration() {
        let err = Options::builder()
            .points(0)
            .duration(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuota(_)));

        let err = Options::builder()
            .points(10)
            .duration(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuota(_)));
    }

    #[test]
    fn build_succeeds_with_defaults() {
        let opts = Options::builder()
            .points(10)
            .duration(Duration::from_secs(1))
            .build()
            .unwrap();

        assert_eq!(opts.points(), 10);
        assert_eq!(opts.strategy(), Strategy::TokenBucket);
        assert_eq!(opts.key_prefix(), "rl");
        assert_eq!(opts.block_duration(), Duration::from_secs(1));
    }

    #[test]
    fn explicit_block_duration_overrides_default() {
        let opts = Options::builder()
            .points(10)
            .duration(Duration::from_secs(1))
            .block_duration(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(opts.block_duration(), Duration::from_secs(30));
    }
}
