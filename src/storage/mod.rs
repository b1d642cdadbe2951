//! Storage backend trait and implementations.
//!
//! This module defines the `Storage` trait every backend implements, plus
//! the in-memory, Redis-like, and Memcached-like adapters and the
//! `StorageBackend` enum that lets a `RateLimiter` pick one at runtime.

#[cfg(feature = "memcached")]
mod memcached;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "memcached")]
pub use memcached::{MemcachedConfig, MemcachedStorage};
#[cfg(feature = "memory")]
pub use memory::{GcConfig, GcInterval, MemoryStorage};
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStorage};

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Storage backend trait for rate limiting state.
///
/// Every operation is async to support both local and remote backends.
/// Implementations must be thread-safe (`Send + Sync`). This mirrors the
/// two-shaped storage contract a rate limiter actually needs: one atomic
/// counter primitive for Fixed Window and `block`, and an opaque JSON blob
/// pair for the other three algorithms' typed per-key state.
pub trait Storage: Send + Sync + 'static {
    /// Atomically add `amount` to the counter at `key`, creating it with
    /// TTL `ttl` if absent, and return the value after the update.
    ///
    /// `amount` may be negative in principle (the type allows it) but
    /// every call site in this crate passes a non-negative value; backends
    /// whose wire protocol only supports unsigned counters (Memcached)
    /// reject negative amounts with `RateLimitError::InputError`.
    fn increment(
        &self,
        key: &str,
        amount: i64,
        ttl: Duration,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Read a counter's current value without mutating it.
    fn get_counter(&self, key: &str) -> impl Future<Output = Result<Option<u64>>> + Send;

    /// Read and deserialize an algorithm's JSON state blob.
    fn get_json<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send;

    /// Serialize and store an algorithm's JSON state blob with TTL `ttl`.
    fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove any state (counter or JSON blob) stored at `key`.
    fn reset(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Release any owned connection-pool resources. Idempotent.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Runtime-selected storage backend.
///
/// Enum dispatch, not a trait object, because `Storage::get_json`/`set_json`
/// are generic over the payload type and therefore not object-safe.
pub enum StorageBackend {
    /// In-process storage.
    #[cfg(feature = "memory")]
    Memory(MemoryStorage),
    /// Redis-like remote storage.
    #[cfg(feature = "redis")]
    Redis(RedisStorage),
    /// Memcached-like remote storage.
    #[cfg(feature = "memcached")]
    Memcached(MemcachedStorage),
}

impl Storage for StorageBackend {
    async fn increment(&self, key: &str, amount: i64, ttl: Duration) -> Result<u64> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.increment(key, amount, ttl).await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.increment(key, amount, ttl).await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.increment(key, amount, ttl).await,
        }
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.get_counter(key).await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.get_counter(key).await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.get_counter(key).await,
        }
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.get_json(key).await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.get_json(key).await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.get_json(key).await,
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.set_json(key, value, ttl).await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.set_json(key, value, ttl).await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.set_json(key, value, ttl).await,
        }
    }

    async fn reset(&self, key: &str) -> Result<()> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.reset(key).await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.reset(key).await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.reset(key).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.close().await,
            #[cfg(feature = "redis")]
            Self::Redis(s) => s.close().await,
            #[cfg(feature = "memcached")]
            Self::Memcached(s) => s.close().await,
        }
    }
}

impl StorageBackend {
    /// Best-effort backend name, used for client auto-detection and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(_) => "memory",
            #[cfg(feature = "redis")]
            Self::Redis(_) => "redis",
            #[cfg(feature = "memcached")]
            Self::Memcached(_) => "memcached",
        }
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
