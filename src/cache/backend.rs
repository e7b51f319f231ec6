//! Backing key-value stores.
//!
//! The cache treats its backend as best-effort memoization: entries carry a
//! TTL, may be dropped early, and any operation may fail transiently.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::config::CacheConfig;
use super::error::BackendError;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::backend";

/// Longest TTL the store honours; longer requests are shortened to this.
pub const MAX_ITEM_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Key-value store with TTL expiry and no durability guarantee.
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), BackendError>;

    /// Deleting a key that is not present succeeds.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

struct StoredItem {
    value: Bytes,
    expires_at: Instant,
}

/// Process-local backend with LRU eviction, per-item TTL and a per-item size limit.
pub struct MemoryKvStore {
    items: Mutex<LruCache<String, StoredItem>>,
    item_size_limit: usize,
}

impl MemoryKvStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            items: Mutex::new(LruCache::new(config.memory_capacity_non_zero())),
            item_size_limit: config.item_size_limit_bytes,
        }
    }

    /// Number of stored items, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        mutex_lock(&self.items, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvBackend for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        let mut items = mutex_lock(&self.items, SOURCE, "get");
        match items.get(key) {
            None => return Ok(None),
            Some(item) if item.expires_at > Instant::now() => {
                return Ok(Some(item.value.clone()));
            }
            Some(_) => {}
        }
        items.pop(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), BackendError> {
        if value.len() > self.item_size_limit {
            return Err(BackendError::ItemTooLarge {
                size: value.len(),
                limit: self.item_size_limit,
            });
        }

        let item = StoredItem {
            value,
            expires_at: Instant::now() + ttl.min(MAX_ITEM_TTL),
        };
        let evicted = mutex_lock(&self.items, SOURCE, "put").push(key.to_string(), item);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!("recache_cache_capacity_evict_total").increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        mutex_lock(&self.items, SOURCE, "delete").pop(key);
        Ok(())
    }
}
