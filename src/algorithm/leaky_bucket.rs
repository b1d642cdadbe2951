//! Leaky Bucket rate limiting algorithm.
//!
//! Models an ordered FIFO queue of `{timestamp, points}` items rather than
//! a scalar fill level, so admission is an exact point-budget check and
//! draining removes whole items front-to-back: an item only leaves the
//! queue once the accumulated drain budget fully covers its points,
//! forfeiting any partial credit toward the next item.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::{Engine, current_timestamp_ms, free_probe_result};
use crate::error::Result;
use crate::options::Options;
use crate::result::RateLimitResult;
use crate::storage::Storage;

const STATE_SUFFIX: &str = "lb";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct QueueItem {
    ts_ms: u64,
    points: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LeakyBucketState {
    queue: Vec<QueueItem>,
    last_drain_ms: u64,
}

/// Leaky Bucket rate limiting algorithm.
#[derive(Debug, Clone, Default)]
pub struct LeakyBucket;

impl LeakyBucket {
    /// Create a new Leaky Bucket engine instance.
    pub fn new() -> Self {
        Self
    }

    fn drain_rate(opts: &Options) -> f64 {
        opts.points() as f64 / opts.duration().as_secs_f64()
    }

    /// Drain whole items front-to-back. Returns the updated queue and the
    /// leftover drain budget (points worth) that couldn't be applied to a
    /// partially-covered item.
    fn drain(mut queue: Vec<QueueItem>, elapsed_ms: u64, drain_rate: f64) -> Vec<QueueItem> {
        let mut budget = (elapsed_ms as f64 / 1000.0) * drain_rate;
        while let Some(front) = queue.first() {
            if (front.points as f64) <= budget {
                budget -= front.points as f64;
                queue.remove(0);
            } else {
                break;
            }
        }
        queue
    }

    fn queued_points(queue: &[QueueItem]) -> u64 {
        queue.iter().map(|i| i.points).sum()
    }
}

impl Engine for LeakyBucket {
    fn name(&self) -> &'static str {
        "leaky_bucket"
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
        let drain_rate = Self::drain_rate(opts);

        let existing = storage.get_json::<LeakyBucketState>(&full_key).await?;
        let queue = match existing {
            Some(state) => Self::drain(
                state.queue,
                now.saturating_sub(state.last_drain_ms),
                drain_rate,
            ),
            None => Vec::new(),
        };

        let current_total = Self::queued_points(&queue);
        tracing::trace!(key, current_total, "leaky bucket drain");
        let ttl = (2 * opts.duration()).max(Duration::from_secs(1));

        if current_total + cost <= capacity {
            let mut queue = queue;
            queue.push(QueueItem {
                ts_ms: now,
                points: cost,
            });
            let remaining = capacity - (current_total + cost);
            let is_first = queue.len() == 1;

            storage
                .set_json(
                    &full_key,
                    &LeakyBucketState {
                        queue,
                        last_drain_ms: now,
                    },
                    ttl,
                )
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
            let remaining = capacity.saturating_sub(current_total);
            let overflow = (current_total + cost - capacity) as f64;
            let ms_before_next = ((overflow / drain_rate) * 1000.0).ceil() as u64;

            storage
                .set_json(
                    &full_key,
                    &LeakyBucketState {
                        queue,
                        last_drain_ms: now,
                    },
                    ttl,
                )
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
        let Some(state) = storage.get_json::<LeakyBucketState>(&full_key).await? else {
            return Ok(None);
        };

        let capacity = opts.points();
        let drain_rate = Self::drain_rate(opts);
        let now = current_timestamp_ms();
        let queue = Self::drain(
            state.queue,
            now.saturating_sub(state.last_drain_ms),
            drain_rate,
        );
        let current_total = Self::queued_points(&queue);
        let remaining = capacity.saturating_sub(current_total);

        Ok(Some(RateLimitResult {
            ms_before_next: 0,
            remaining_points: remaining,
            consumed_points: 0,
            is_first_in_duration: false,
            total_hits: capacity,
            allowed: current_total < capacity,
        }))
    }

    async fn reset<S: Storage>(&self, storage: &S, key: &str, _opts: &Options) -> Result<()> {
        storage.reset(&format!("{key}:{STATE_SUFFIX}")).await
    }
}
