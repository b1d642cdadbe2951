//! Sliding Window rate limiting algorithm.
//!
//! Keeps an exact log of request timestamps rather than blending two fixed
//! windows by elapsed-progress fraction: a request is admitted only if the
//! count of timestamps still inside `[now - duration, now]` plus its cost
//! does not exceed the quota.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Engine, current_timestamp_ms, free_probe_result};
use crate::error::Result;
use crate::options::Options;
use crate::result::RateLimitResult;
use crate::storage::Storage;

const STATE_SUFFIX: &str = "sw";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Hit {
    ts_ms: u64,
    points: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SlidingWindowState {
    hits: Vec<Hit>,
}

/// Sliding Window rate limiting algorithm.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow;

impl SlidingWindow {
    /// Create a new Sliding Window engine instance.
    pub fn new() -> Self {
        Self
    }

    fn in_window(hits: Vec<Hit>, now: u64, window_ms: u64) -> Vec<Hit> {
        let cutoff = now.saturating_sub(window_ms);
        hits.into_iter().filter(|h| h.ts_ms > cutoff).collect()
    }

    fn weight(hits: &[Hit]) -> u64 {
        hits.iter().map(|h| h.points).sum()
    }
}

impl Engine for SlidingWindow {
    fn name(&self) -> &'static str {
        "sliding_window"
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

        let full_key = format!("{key}:{STATE_SUFFIX}");
        let now = current_timestamp_ms();
        let window_ms = opts.duration().as_millis() as u64;

        let existing = storage.get_json::<SlidingWindowState>(&full_key).await?;
        let hits = Self::in_window(existing.map(|s| s.hits).unwrap_or_default(), now, window_ms);

        let current_weight = Self::weight(&hits);
        tracing::trace!(key, current_weight, "sliding window evict");
        let ttl = (2 * opts.duration()).max(Duration::from_secs(1));

        if current_weight + cost <= capacity {
            let is_first = current_weight == 0;
            let mut hits = hits;
            hits.push(Hit {
                ts_ms: now,
                points: cost,
            });
            let remaining = capacity - (current_weight + cost);

            storage
                .set_json(&full_key, &SlidingWindowState { hits }, ttl)
                .await?;

            Ok(RateLimitResult {
                ms_before_next: 0,
                remaining_points: remaining,
                consumed_points: cost,
                is_first_in_duration: is_first,
                total_hits,
                allowed: true,
            })
        } else {
            let remaining = capacity.saturating_sub(current_weight);
            // The earliest hit in the window is the one whose expiry will
            // free up the budget first.
            let ms_before_next = hits.first().map(|h| h.ts_ms + window_ms - now).unwrap_or(0);

            storage
                .set_json(&full_key, &SlidingWindowState { hits }, ttl)
                .await?;

            Ok(RateLimitResult {
                ms_before_next,
                remaining_points: remaining,
                consumed_points: 0,
                is_first_in_duration: false,
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
        let full_key = format!("{key}:{STATE_SUFFIX}");
        let Some(state) = storage.get_json::<SlidingWindowState>(&full_key).await? else {
            return Ok(None);
        };

        let capacity = opts.points();
        let now = current_timestamp_ms();
        let window_ms = opts.duration().as_millis() as u64;
        let hits = Self::in_window(state.hits, now, window_ms);
        let current_weight = Self::weight(&hits);
        let remaining = capacity.saturating_sub(current_weight);

        Ok(Some(RateLimitResult {
            ms_before_next: 0,
            remaining_points: remaining,
            consumed_points: 0,
            is_first_in_duration: false,
            total_hits: capacity,
            allowed: current_weight < capacity,
        }))
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str, _opts: &Options) -> Result<()> {
        storage.reset(&format!("{key}:{STATE_SUFFIX}")).await
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
        let engine = SlidingWindow::new();
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
    async fn old_hits_fall_out_of_window() {
        let engine = SlidingWindow::new();
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
        let engine = SlidingWindow::new();
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
    async fn reset_clears_hits() {
        let engine = SlidingWindow::new();
        let storage = MemoryStorage::new();
        let o = opts(1, 60);

        engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        engine.reset(&storage, "user:1", &o).await.unwrap();

        let r = engine.consume(&storage, "user:1", &o, 1).await.unwrap();
        assert!(r.allowed);
    }
}
