//! The public `RateLimiter` facade.
//!
//! Ties a `Storage` backend and an `Options` quota together and dispatches
//! every call to the engine matching `Options::strategy` at runtime — the
//! strategy is configuration, not a type parameter, so this is a `match`
//! rather than static generics over `Engine`.

use std::time::Duration;

use crate::algorithm::{Engine, FixedWindow, LeakyBucket, SlidingWindow, TokenBucket, set_block};
use crate::error::Result;
use crate::options::{Options, Strategy};
use crate::result::RateLimitResult;
use crate::storage::Storage;

/// A configured rate limiter bound to one `Storage` backend and one quota.
#[derive(Debug)]
pub struct RateLimiter<S: Storage> {
    storage: S,
    opts: Options,
}

impl<S: Storage> RateLimiter<S> {
    /// Build a rate limiter from a storage backend and validated options.
    pub fn new(storage: S, opts: Options) -> Self {
        Self { storage, opts }
    }

    /// The quota this limiter enforces.
    pub fn options(&self) -> &Options {
        &self.opts
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.opts.key_prefix(), key)
    }

    /// Consume `cost` points from `key`'s quota, returning the decision.
    pub async fn consume(&self, key: &str, cost: u64) -> Result<RateLimitResult> {
        let full_key = self.full_key(key);
        let result = match self.opts.strategy() {
            Strategy::TokenBucket => {
                TokenBucket::new()
                    .consume(&self.storage, &full_key, &self.opts, cost)
                    .await
            }
            Strategy::LeakyBucket => {
                LeakyBucket::new()
                    .consume(&self.storage, &full_key, &self.opts, cost)
                    .await
            }
            Strategy::SlidingWindow => {
                SlidingWindow::new()
                    .consume(&self.storage, &full_key, &self.opts, cost)
                    .await
            }
            Strategy::FixedWindow => {
                FixedWindow::new()
                    .consume(&self.storage, &full_key, &self.opts, cost)
                    .await
            }
        }?;
        tracing::debug!(
            key = full_key,
            strategy = ?self.opts.strategy(),
            cost,
            allowed = result.allowed,
            remaining = result.remaining_points,
            "consume"
        );
        Ok(result)
    }

    /// Consume exactly one point, the common case.
    pub async fn consume_one(&self, key: &str) -> Result<RateLimitResult> {
        self.consume(key, 1).await
    }

    /// Inspect `key`'s current state without recording a request.
    pub async fn get(&self, key: &str) -> Result<Option<RateLimitResult>> {
        let full_key = self.full_key(key);
        let result = match self.opts.strategy() {
            Strategy::TokenBucket => {
                TokenBucket::new()
                    .peek(&self.storage, &full_key, &self.opts)
                    .await
            }
            Strategy::LeakyBucket => {
                LeakyBucket::new()
                    .peek(&self.storage, &full_key, &self.opts)
                    .await
            }
            Strategy::SlidingWindow => {
                SlidingWindow::new()
                    .peek(&self.storage, &full_key, &self.opts)
                    .await
            }
            Strategy::FixedWindow => {
                FixedWindow::new()
                    .peek(&self.storage, &full_key, &self.opts)
                    .await
            }
        }?;
        tracing::debug!(key = full_key, found = result.is_some(), "get");
        Ok(result)
    }

    /// Clear all recorded state for `key`, across every strategy's key
    /// shape. `Options::strategy` only governs which engine a `consume`/`get`
    /// call dispatches to; a key may carry state left over from a previous
    /// configuration (or a caller reusing the key across limiters), so reset
    /// clears the raw key plus all four suffixed forms unconditionally.
    pub async fn reset(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key);
        self.storage.reset(&full_key).await?;
        TokenBucket::new()
            .reset(&self.storage, &full_key, &self.opts)
            .await?;
        LeakyBucket::new()
            .reset(&self.storage, &full_key, &self.opts)
            .await?;
        SlidingWindow::new()
            .reset(&self.storage, &full_key, &self.opts)
            .await?;
        FixedWindow::new()
            .reset(&self.storage, &full_key, &self.opts)
            .await?;
        tracing::debug!(key = full_key, "reset");
        Ok(())
    }

    /// Explicitly block `key` for `duration` (or the quota's configured
    /// `block_duration` when `duration` is zero), regardless of remaining
    /// quota. Only Fixed Window consults this; the other three strategies
    /// still record it (it is write-only/advisory for them).
    pub async fn block(&self, key: &str, duration: Duration) -> Result<()> {
        let full_key = self.full_key(key);
        let duration = if duration.is_zero() {
            self.opts.block_duration()
        } else {
            duration
        };
        tracing::debug!(key = full_key, duration_ms = duration.as_millis() as u64, "block");
        set_block(&self.storage, &full_key, duration).await
    }

    /// Release any owned storage resources (connection pools, GC tasks).
    pub async fn close(&self) -> Result<()> {
        self.storage.close().await
    }
}
