//! Rate limiting algorithm engines.
//!
//! Each engine implements one of the four admission-control strategies a
//! `RateLimiter` can be configured with. All four share the same shape:
//! a zero-sized type with `consume`/`peek`/`reset` methods generic over
//! `Storage`, dispatched at runtime by the facade based on
//! `Options::strategy`.

mod fixed_window;
mod leaky_bucket;
mod sliding_window;
mod token_bucket;

pub use fixed_window::FixedWindow;
pub(crate) use fixed_window::set_block;
pub use leaky_bucket::LeakyBucket;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;

use std::future::Future;

use crate::error::Result;
use crate::options::Options;
use crate::result::RateLimitResult;
use crate::storage::Storage;

/// A rate limiting admission-control engine.
pub trait Engine: Send + Sync + 'static {
    /// Get the engine name, for logging.
    fn name(&self) -> &'static str;

    /// Consume `cost` points against `key`'s quota, returning the decision.
    ///
    /// `cost == 0` is a free probe: always allowed, state is left untouched
    /// (this is the uniform resolution this crate applies to all four
    /// engines, not only Token Bucket).
    fn consume<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
        cost: u64,
    ) -> impl Future<Output = Result<RateLimitResult>> + Send;

    /// Inspect current state without recording a request. Returns `None`
    /// when no state has been recorded yet for `key`.
    fn peek<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
    ) -> impl Future<Output = Result<Option<RateLimitResult>>> + Send;

    /// Reset this engine's state for `key`.
    fn reset<S: Storage>(
        &self,
        storage: &S,
        key: &str,
        opts: &Options,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub(crate) fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// A free probe result: always allowed, no state mutation, full quota shown.
pub(crate) fn free_probe_result(total_hits: u64) -> RateLimitResult {
    RateLimitResult {
        ms_before_next: 0,
        remaining_points: total_hits,
        consumed_points: 0,
        is_first_in_duration: false,
        total_hits,
        allowed: true,
    }
}
