//! Memcached storage backend for distributed rate limiting.
//!
//! The `memcache` crate's client is synchronous; the standard idiom for
//! bridging a sync client into an async trait is a pool plus
//! `tokio::task::spawn_blocking`, since there is no maintained async-native,
//! deadpool-style Memcached client in the ecosystem.

use std::time::Duration;

use r2d2::Pool;
use r2d2_memcache::MemcacheConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ConnectionError, RateLimitError, Result, StorageError};
use crate::storage::Storage;

/// Memcached storage configuration.
#[derive(Debug, Clone)]
pub struct MemcachedConfig {
    /// Memcached connection URL (e.g., "memcache://127.0.0.1:11211")
    pub url: String,
    /// Connection pool size
    pub pool_size: u32,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
}

impl Default for MemcachedConfig {
    fn default() -> Self {
        Self {
            url: "memcache://127.0.0.1:11211".to_string(),
            pool_size: 10,
            key_prefix: "rl:".to_string(),
        }
    }
}

impl MemcachedConfig {
    /// Create a new Memcached configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }
}

/// Memcached storage backend for distributed rate limiting.
pub struct MemcachedStorage {
    pool: Pool<MemcacheConnectionManager>,
    key_prefix: String,
}

impl std::fmt::Debug for MemcachedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedStorage")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl MemcachedStorage {
    /// Create a new Memcached storage from configuration.
    pub async fn new(config: MemcachedConfig) -> Result<Self> {
        let url = config.url.clone();
        let pool_size = config.pool_size;

        let pool = tokio::task::spawn_blocking(move || {
            let manager = MemcacheConnectionManager::new(url.as_str());
            Pool::builder().max_size(pool_size).build(manager)
        })
        .await
        .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?
        .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
        })
    }

    /// Create a new Memcached storage from a URL.
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(MemcachedConfig::new(url)).await
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

impl Storage for MemcachedStorage {
    async fn increment(&self, key: &str, amount: i64, ttl: Duration) -> Result<u64> {
        if amount < 0 {
            return Err(RateLimitError::InputError(format!(
                "memcached increment amount must be non-negative, got {amount}"
            )));
        }

        let pool = self.pool.clone();
        let full_key = self.full_key(key);
        let amount = amount as u64;
        let exptime = ttl.as_secs().max(1) as u32;

        tokio::task::spawn_blocking(move || {
            let client = pool.get().map_err(|e| {
                tracing::warn!(error = %e, "memcached pool exhausted");
                StorageError::operation_failed(e.to_string(), true)
            })?;
            match client.increment(&full_key, amount) {
                Ok(new_value) => Ok(new_value),
                Err(_) => {
                    client
                        .set(&full_key, amount, exptime)
                        .map_err(|e| StorageError::operation_failed(e.to_string(), true))?;
                    Ok(amount)
                }
            }
        })
        .await
        .map_err(|e| StorageError::operation_failed(e.to_string(), true))?
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        let pool = self.pool.clone();
        let full_key = self.full_key(key);

        tokio::task::spawn_blocking(move || {
            let client = pool.get().map_err(|e| {
                tracing::warn!(error = %e, "memcached pool exhausted");
                StorageError::operation_failed(e.to_string(), true)
            })?;
            client
                .get::<u64>(&full_key)
                .map_err(|e| StorageError::operation_failed(e.to_string(), true).into())
        })
        .await
        .map_err(|e| StorageError::operation_failed(e.to_string(), true))?
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let pool = self.pool.clone();
        let full_key = self.full_key(key);

        let json: Option<String> =
            tokio::task::spawn_blocking(move || -> Result<Option<String>> {
                let client = pool
                    .get()
                    .map_err(|e| StorageError::operation_failed(e.to_string(), true))?;
                client
                    .get::<String>(&full_key)
                    .map_err(|e| StorageError::operation_failed(e.to_string(), true).into())
            })
            .await
            .map_err(|e| StorageError::operation_failed(e.to_string(), true))??;

        match json {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let json =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let pool = self.pool.clone();
        let full_key = self.full_key(key);
        let exptime = ttl.as_secs().max(1) as u32;

        tokio::task::spawn_blocking(move || {
            let client = pool.get().map_err(|e| {
                tracing::warn!(error = %e, "memcached pool exhausted");
                StorageError::operation_failed(e.to_string(), true)
            })?;
            client
                .set(&full_key, json, exptime)
                .map_err(|e| StorageError::operation_failed(e.to_string(), true).into())
        })
        .await
        .map_err(|e| StorageError::operation_failed(e.to_string(), true))?
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let pool = self.pool.clone();
        let full_key = self.full_key(key);

        tokio::task::spawn_blocking(move || {
            let client = pool.get().map_err(|e| {
                tracing::warn!(error = %e, "memcached pool exhausted");
                StorageError::operation_failed(e.to_string(), true)
            })?;
            match client.delete(&full_key) {
                Ok(_) => Ok(()),
                Err(_) => Ok(()),
            }
        })
        .await
        .map_err(|e| StorageError::operation_failed(e.to_string(), true))?
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
