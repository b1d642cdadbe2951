//! Token Bucket rate limiting algorithm.
//!
//! Allows controlled bursts while enforcing an average rate: tokens refill
//! continuously up to the quota's point allowance, and each request
//! consumes `cost` tokens if enough are available.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Engine, current_timestamp_ms, free_probe_result};
use crate::error::Result;
use crate::options::Options;
use crate::result::RateLimitResult;
use crate::storage::Storage;

const STATE_SUFFIX: &str = "tb";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TokenBucketState {
    tokens: f64,
    last_refill_ms: u64,
}

/// Token Bucket rate limiting algorithm.
#[derive(Debug, Clone, Default)]
pub struct TokenBucket;

impl TokenBucket {
    /// Create a new Token Bucket engine instance.
    pub fn new() -> Self {
        Self
    }

    fn refill_rate(opts: &Options) -> f64 {
        opts.points() as f64 / opts.duration().as_secs_f64()
    }

    fn refill(tokens: f64, elapsed_ms: u64, refill_rate: f64, capacity: f64) -> f64 {
        let refilled = tokens + (elapsed_ms as f64 / 1000.0) * refill_rate;
        refilled.min(capacity)
    }
}

impl Engine for TokenBucket {
    fn name(&self) -> &'static str {
        "token_bucket"
    }

    async fn consume<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
        cost: u64,
    ) -> Result<RateLimitResult> {
        let capacity = opts.points() as f64;
        let total_hits = opts.points();

        if cost == 0 {
            return Ok(free_probe_result(total_hits));
        }

        let full_key = format!("{key}:{STATE_SUFFIX}");
        let now = current_timestamp_ms();
        let refill_rate = Self::refill_rate(opts);

        let existing = storage.get_json::<TokenBucketState>(&full_key).await?;
        let last_refill_ms = existing.map(|s| s.last_refill_ms).unwrap_or(now);
        let elapsed_ms = now.saturating_sub(last_refill_ms);
        let is_first = elapsed_ms > opts.duration().as_millis() as u64;
        let tokens = match existing {
            Some(state) => Self::refill(state.tokens, elapsed_ms, refill_rate, capacity),
            None => capacity,
        };
        tracing::trace!(key, elapsed_ms, tokens, "token bucket refill");

        let cost_f = cost as f64;
        let ttl = (2 * opts.duration()).max(Duration::from_secs(1));

        if tokens >= cost_f {
            let remaining_tokens = tokens - cost_f;
            storage
                .set_json(
                    &full_key,
                    &TokenBucketState {
                        tokens: remaining_tokens,
                        last_refill_ms: now,
                    },
                    ttl,
                )
                .await?;

            Ok(RateLimitResult {
                ms_before_next: 0,
                remaining_points: remaining_tokens.floor() as u64,
                consumed_points: cost,
                is_first_in_duration: is_first,
                total_hits,
                allowed: true,
            })
        } else {
            storage
                .set_json(
                    &full_key,
                    &TokenBucketState {
                        tokens,
                        last_refill_ms: now,
                    },
                    ttl,
                )
                .await?;

            let missing = cost_f - tokens;
            let ms_before_next = ((missing / refill_rate) * 1000.0).ceil() as u64;

            Ok(RateLimitResult {
                ms_before_next,
                remaining_points: tokens.floor() as u64,
                consumed_points: 0,
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
        let full_key = format!("{key}:{STATE_SUFFIX}");
        let Some(state) = storage.get_json::<TokenBucketState>(&full_key).await? else {
            return Ok(None);
        };

        let capacity = opts.points() as f64;
        let total_hits = opts.points();
        let refill_rate = Self::refill_rate(opts);
        let now = current_timestamp_ms();
        let tokens = Self::refill(
            state.tokens,
            now.saturating_sub(state.last_refill_ms),
            refill_rate,
            capacity,
        );

        let ms_before_next = if tokens >= 1.0 {
            0
        } else {
            (((1.0 - tokens) / refill_rate) * 1000.0).ceil() as u64
        };

        Ok(Some(RateLimitResult {
            ms_before_next,
            remaining_points: tokens.floor() as u64,
            consumed_points: 0,
            is_first_in_duration: false,
            total_hits,
            allowed: tokens >= 1.0,
        }))
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str, _opts: &Options) -> Result<()> {
        storage.reset(&format!("{key}:{STATE_SUFFIX}")).await
    }
}
