//! In-memory storage with automatic garbage collection.
//!
//! Uses `DashMap` for thread-safe concurrent access and includes
//! configurable garbage collection to prevent unbounded memory growth.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Notify;

use crate::error::Result;
use crate::storage::{Storage, current_timestamp_ms};

/// Garbage collection interval configuration.
#[derive(Debug, Clone)]
pub enum GcInterval {
    /// Run GC every N requests.
    Requests(u64),
    /// Run GC at fixed time intervals.
    Duration(Duration),
    /// Disable automatic GC.
    Manual,
}

impl Default for GcInterval {
    fn default() -> Self {
        Self::Requests(10000)
    }
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Default)]
pub struct GcConfig {
    /// When to trigger GC.
    pub interval: GcInterval,
}

impl GcConfig {
    /// Create config with request-based GC.
    pub fn on_requests(count: u64) -> Self {
        Self {
            interval: GcInterval::Requests(count),
        }
    }

    /// Create config with time-based GC.
    pub fn on_duration(interval: Duration) -> Self {
        Self {
            interval: GcInterval::Duration(interval),
        }
    }

    /// Create config with manual GC only.
    pub fn manual() -> Self {
        Self {
            interval: GcInterval::Manual,
        }
    }
}

/// A stored value: either a raw counter or an opaque JSON blob.
#[derive(Debug, Clone)]
enum StoredValue {
    Counter(u64),
    Json(String),
}

/// Internal entry with expiration tracking.
#[derive(Debug, Clone)]
struct InternalEntry {
    value: StoredValue,
    expires_at: u64,
}

/// In-memory storage with garbage collection.
///
/// Correctness never depends on the reaper running: `get_counter`/`get_json`
/// always check expiry themselves before returning a value.
pub struct MemoryStorage {
    data: DashMap<String, InternalEntry>,
    gc_config: GcConfig,
    request_count: AtomicU64,
    gc_lock: Mutex<()>,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("entries", &self.data.len())
            .field("gc_config", &self.gc_config)
            .finish()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create a new memory storage with default GC configuration.
    pub fn new() -> Self {
        Self::with_gc(GcConfig::default())
    }

    /// Create a new memory storage with custom GC configuration.
    pub fn with_gc(gc_config: GcConfig) -> Self {
        let storage = Self {
            data: DashMap::new(),
            gc_config: gc_config.clone(),
            request_count: AtomicU64::new(0),
            gc_lock: Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
        };

        if let GcInterval::Duration(interval) = gc_config.interval {
            storage.start_gc_task(interval);
        }

        storage
    }

    fn start_gc_task(&self, interval: Duration) {
        let data = self.data.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        run_gc_on_map(&data);
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });
    }

    /// Manually trigger garbage collection.
    pub async fn run_gc(&self) {
        run_gc_on_map(&self.data);
    }

    /// Get the number of entries currently stored (including possibly expired ones
    /// not yet reaped).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the storage holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn maybe_run_gc(&self) {
        if let GcInterval::Requests(threshold) = self.gc_config.interval {
            let count = self.request_count.fetch_add(1, Ordering::Relaxed);
            if count.is_multiple_of(threshold)
                && count > 0
                && let Some(_guard) = self.gc_lock.try_lock()
            {
                run_gc_on_map(&self.data);
            }
        }
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

fn run_gc_on_map(data: &DashMap<String, InternalEntry>) {
    let now = current_timestamp_ms();
    data.retain(|_, entry| entry.expires_at > now);
}

impl Storage for MemoryStorage {
    async fn increment(&self, key: &str, amount: i64, ttl: Duration) -> Result<u64> {
        self.maybe_run_gc();

        let expires_at = current_timestamp_ms() + ttl.as_millis() as u64;
        let now = current_timestamp_ms();

        let new_count = self
            .data
            .entry(key.to_string())
            .and_modify(|internal| {
                let current = match internal.value {
                    StoredValue::Counter(c) if internal.expires_at > now => c,
                    _ => 0,
                };
                let updated = (current as i64 + amount).max(0) as u64;
                internal.value = StoredValue::Counter(updated);
                internal.expires_at = expires_at;
            })
            .or_insert_with(|| InternalEntry {
                value: StoredValue::Counter(amount.max(0) as u64),
                expires_at,
            });

        let StoredValue::Counter(count) = new_count.value else {
            unreachable!("increment always stores a counter value")
        };
        Ok(count)
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        self.maybe_run_gc();

        let now = current_timestamp_ms();
        if let Some(internal) = self.data.get(key)
            && internal.expires_at > now
            && let StoredValue::Counter(count) = internal.value
        {
            return Ok(Some(count));
        }
        Ok(None)
    }

    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        self.maybe_run_gc();

        let now = current_timestamp_ms();
        let Some(internal) = self.data.get(key) else {
            return Ok(None);
        };
        if internal.expires_at <= now {
            drop(internal);
            self.data.remove(key);
            return Ok(None);
        }
        let StoredValue::Json(ref json) = internal.value else {
            return Ok(None);
        };
        let value = serde_json::from_str(json)
            .map_err(|e| crate::error::StorageError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.maybe_run_gc();

        let json = serde_json::to_string(value)
            .map_err(|e| crate::error::StorageError::Serialization(e.to_string()))?;
        let expires_at = current_timestamp_ms() + ttl.as_millis() as u64;
        self.data.insert(
            key.to_string(),
            InternalEntry {
                value: StoredValue::Json(json),
                expires_at,
            },
        );
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
