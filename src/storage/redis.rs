//! Redis storage backend for distributed rate limiting.
//!
//! Uses connection pooling for high performance, and a real pipelined
//! `INCRBY`+`EXPIRE` for the counter primitive so Fixed Window's
//! linearizable-increment property holds against a remote store, not just
//! a single process.

use std::time::Duration;

use deadpool_redis::redis::{AsyncCommands, Pipeline, cmd};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ConnectionError, Result, StorageError};
use crate::storage::Storage;

/// Redis storage configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Key prefix for rate limit keys
    pub key_prefix: String,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "rl:".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Create a new Redis configuration.
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
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Redis storage backend for distributed rate limiting.
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
}

impl std::fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorage")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStorage {
    /// Create a new Redis storage from configuration.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;
        let _: () = cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix,
        })
    }

    /// Create a new Redis storage from a URL.
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig::new(url)).await
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::warn!(error = %e, "redis pool exhausted");
            StorageError::PoolExhausted.into()
        })
    }
}

impl Storage for RedisStorage {
    async fn increment(&self, key: &str, amount: i64, ttl: Duration) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        let mut pipe = Pipeline::new();
        pipe.atomic();
        pipe.cmd("INCRBY").arg(&full_key).arg(amount);
        pipe.cmd("EXPIRE").arg(&full_key).arg(ttl_secs);

        let (new_value, _): (i64, i64) = pipe
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redis operation failed");
                StorageError::operation_failed(e.to_string(), true)
            })?;

        Ok(new_value.max(0) as u64)
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        let value: Option<i64> = conn
            .get(&full_key)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redis operation failed");
                StorageError::operation_failed(e.to_string(), true)
            })?;

        Ok(value.map(|v| v.max(0) as u64))
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        let json: Option<String> = conn
            .get(&full_key)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redis operation failed");
                StorageError::operation_failed(e.to_string(), true)
            })?;

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
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);
        let ttl_secs = ttl.as_secs().max(1);

        let json =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(&full_key, json, ttl_secs)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redis operation failed");
                StorageError::operation_failed(e.to_string(), true)
            })?;

        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let full_key = self.full_key(key);

        conn.del::<_, ()>(&full_key)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "redis operation failed");
                StorageError::operation_failed(e.to_string(), true)
            })?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        Ok(())
    }
}
