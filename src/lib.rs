//! Rate limiting engine with pluggable storage and admission-control
//! strategies.
//!
//! `ratelimit_engine` provides:
//!
//! - **Four strategies**: Token Bucket, Leaky Bucket, Sliding Window, Fixed Window
//! - **Pluggable storage**: in-memory with GC, Redis-like, Memcached-like
//! - **One facade**: `RateLimiter` dispatches to the configured strategy at runtime
//!
//! # Quick Start
//!
//! ```
//! use ratelimit_engine::{MemoryStorage, Options, RateLimiter, Strategy};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let opts = Options::builder()
//!     .points(10)
//!     .duration(Duration::from_secs(60))
//!     .strategy(Strategy::TokenBucket)
//!     .build()
//!     .unwrap();
//!
//! let limiter = RateLimiter::new(MemoryStorage::new(), opts);
//! let result = limiter.consume_one("user:123").await.unwrap();
//!
//! if result.allowed {
//!     println!("Request allowed! {} remaining", result.remaining_points);
//! } else {
//!     println!("Rate limited! Retry after {}s", result.retry_after_secs());
//! }
//! # }
//! ```
//!
//! # Strategies
//!
//! | Strategy | Best For | State |
//! |----------|----------|-------|
//! | Token Bucket | Bursty traffic, smooth refill | scalar token count |
//! | Leaky Bucket | Constant drain rate, no burst | FIFO queue of costs |
//! | Sliding Window | Precise rolling-window accounting | exact timestamp log |
//! | Fixed Window | Cheapest, simple use cases | one counter per window |
//!
//! # Feature Flags
//!
//! - `memory` (default): in-memory storage with garbage collection
//! - `redis`: Redis-like remote storage backend
//! - `memcached`: Memcached-like remote storage backend
//! - `full`: all backends

pub mod algorithm;
pub mod error;
pub mod facade;
pub mod headers;
pub mod options;
pub mod result;
pub mod storage;

// Re-export main types
pub use error::{ConfigError, ConnectionError, RateLimitError, Result, StorageError};
pub use facade::RateLimiter;
pub use headers::RateLimitHeaders;
pub use options::{Options, OptionsBuilder, StoreType, Strategy};
pub use result::RateLimitResult;
pub use storage::{Storage, StorageBackend};

// Re-export algorithms
pub use algorithm::{Engine, FixedWindow, LeakyBucket, SlidingWindow, TokenBucket};

// Re-export storage backends
#[cfg(feature = "memory")]
pub use storage::{GcConfig, GcInterval, MemoryStorage};
#[cfg(feature = "memcached")]
pub use storage::{MemcachedConfig, MemcachedStorage};
#[cfg(feature = "redis")]
pub use storage::{RedisConfig, RedisStorage};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::algorithm::{Engine, FixedWindow, LeakyBucket, SlidingWindow, TokenBucket};
    pub use crate::error::{RateLimitError, Result};
    pub use crate::facade::RateLimiter;
    pub use crate::options::{Options, StoreType, Strategy};
    pub use crate::result::RateLimitResult;
    pub use crate::storage::{Storage, StorageBackend};

    #[cfg(feature = "memory")]
    pub use crate::storage::{GcConfig, GcInterval, MemoryStorage};
    #[cfg(feature = "memcached")]
    pub use crate::storage::{MemcachedConfig, MemcachedStorage};
    #[cfg(feature = "redis")]
    pub use crate::storage::{RedisConfig, RedisStorage};
}
