//! Fixed Window rate limiting algorithm.
//!
//! Buckets time into non-overlapping windows of `duration` and keeps a
//! single atomic counter per window, keyed by the window's start instant.
//! Cheapest of the four strategies, at the cost of allowing up to twice the
//! quota across a window boundary.
//!
//! This is the only engine that consults the shared `:block` record: a
//! caller that has been explicitly blocked is denied outright, before the
//! window counter is touched.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Engine, current_timestamp_ms, free_probe_result};
use crate::error::Result;
use crate::options::Options;
use crate::result::RateLimitResult;
use crate::storage::Storage;

const BLOCK_SUFFIX: &str = "block";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BlockState {
    blocked_until_ms: u64,
}

/// Fixed Window rate limiting algorithm.
#[derive(Debug, Clone, Default)]
pub struct FixedWindow;

impl FixedWindow {
    /// Create a new Fixed Window engine instance.
    pub fn new() -> Self {
        Self
    }

    fn window_start(now: u64, window_ms: u64) -> u64 {
        (now / window_ms) * window_ms
    }

    fn window_key(key: &str, window_start: u64) -> String {
        format!("{key}:{window_start}")
    }

    fn block_key(key: &str) -> String {
        format!("{key}:{BLOCK_SUFFIX}")
    }

    async fn active_block<S: Storage>(storage: &S, key: &str, now: u64) -> Result<Option<u64>> {
        let block = storage
            .get_json::<BlockState>(&Self::block_key(key))
            .await?;
        Ok(block
            .filter(|b| b.blocked_until_ms > now)
            .map(|b| b.blocked_until_ms - now))
    }
}

/// Record a block on `key` for `block_duration`, consulted by
/// [`FixedWindow::consume`] and [`FixedWindow::peek`]. Lives here rather than
/// on the `Engine` trait since only Fixed Window honors it.
pub(crate) async fn set_block<S: Storage>(
    storage: &S,
    key: &str,
    block_duration: Duration,
) -> Result<()> {
    let now = current_timestamp_ms();
    let blocked_until_ms = now + block_duration.as_millis() as u64;
    storage
        .set_json(
            &FixedWindow::block_key(key),
            &BlockState { blocked_until_ms },
            block_duration,
        )
        .await
}

impl Engine for FixedWindow {
    fn name(&self) -> &'static str {
        "fixed_window"
    }

    async fn consume<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
        cost: u64,
    ) -> Result<RateLimitResult> {
        let capacity = opts.points();
        let total_hits = capacity;

        if cost == 0 {
            return Ok(free_probe_result(total_hits));
        }

        let now = current_timestamp_ms();

        if let Some(ms_before_next) = Self::active_block(storage, key, now).await? {
            return Ok(RateLimitResult {
                ms_before_next,
                remaining_points: 0,
                consumed_points: 0,
                is_first_in_duration: false,
                total_hits,
                allowed: false,
            });
        }

        let window_ms = opts.duration().as_millis().max(1) as u64;
        let window_start = Self::window_start(now, window_ms);
        let window_key = Self::window_key(key, window_start);
        let window_end = window_start + window_ms;
        let ttl = Duration::from_millis(window_end.saturating_sub(now).max(1));

        // Read before writing: an over-quota `cost` must not touch the
        // counter, or a later smaller-cost call would be denied against a
        // total that was never truly consumed.
        let prior = storage.get_counter(&window_key).await?.unwrap_or(0);
        let is_first = prior == 0;
        tracing::trace!(key, prior, cost, "fixed window check");

        if prior + cost <= capacity {
            let new_count = storage.increment(&window_key, cost as i64, ttl).await?;
            Ok(RateLimitResult {
                ms_before_next: 0,
                remaining_points: capacity.saturating_sub(new_count),
                consumed_points: new_count,
                is_first_in_duration: is_first,
                total_hits,
                allowed: true,
            })
        } else {
            Ok(RateLimitResult {
                ms_before_next: window_end.saturating_sub(now),
                remaining_points: capacity.saturating_sub(prior),
                consumed_points: prior,
                is_first_in_duration: is_first,
                total_hits,
                allowed: false,
            })
        }
    }

    async fn peek<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
    ) -> Result<Option<RateLimitResult>> {
        let now = current_timestamp_ms();

        if let Some(ms_before_next) = Self::active_block(storage, key, now).await? {
            return Ok(Some(RateLimitResult {
                ms_before_next,
                remaining_points: 0,
                consumed_points: 0,
                is_first_in_duration: false,
                total_hits: opts.points(),
                allowed: false,
            }));
        }

        let window_ms = opts.duration().as_millis().max(1) as u64;
        let window_start = Self::window_start(now, window_ms);
        let window_key = Self::window_key(key, window_start);

        let Some(count) = storage.get_counter(&window_key).await? else {
            return Ok(None);
        };

        let capacity = opts.points();
        Ok(Some(RateLimitResult {
            ms_before_next: 0,
            remaining_points: capacity.saturating_sub(count),
            consumed_points: 0,
            is_first_in_duration: false,
            total_hits: capacity,
            allowed: count < capacity,
        }))
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str, opts: &Options) -> Result<()> {
        let window_ms = opts.duration().as_millis().max(1) as u64;
        let window_start = Self::window_start(current_timestamp_ms(), window_ms);
        storage.reset(&Self::window_key(key, window_start)).await?;
        storage.reset(&Self::block_key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn opts(points: u64, duration_secs: u64) -> Options {
        Options::builder()
            .points(points)
            .duration(Duration::from_secs(duration_secs))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn admits_until_capacity_then_denies() {
        let engine = FixedWindow::new();
        let storage = MemoryStorage::new();
        let o = opts(5, 60);

        for i in 1..=5 {
            let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
            assert!(r.allowed, "request {i} should be allowed");
        }

        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(!r.allowed);
    }

    #[tokio::test]
    async fn new_window_resets_budget() {
        let engine = FixedWindow::new();
        let storage = MemoryStorage::new();
        let o = opts(1, 1);

        engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(!r.allowed);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(r.allowed);
    }

    #[tokio::test]
    async fn zero_cost_is_a_free_probe() {
        let engine = FixedWindow::new();
        let storage = MemoryStorage::new();
        let o = opts(1, 60);

        engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        let probe = engine.consume(&storage, "user:1", &o, 0).await.unwrap();
        assert!(probe.allowed);
        assert_eq!(probe.consumed_points, 0);

        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(!r.allowed);
    }

    #[tokio::test]
    async fn active_block_denies_before_touching_window() {
        let engine = FixedWindow::new();
        let storage = MemoryStorage::new();
        let o = opts(5, 60);

        storage
            .set_json(
                &format!("user:1:{BLOCK_SUFFIX}"),
                &BlockState {
                    blocked_until_ms: current_timestamp_ms() + 5_000,
                },
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(!r.allowed);
        assert!(r.ms_before_next > 0);
    }
}
