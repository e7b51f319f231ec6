//! Best-effort byte cache over a [`KvBackend`].
//!
//! Cache availability is never allowed to look like a cache answer: a backend
//! failure on read is logged and reported as a miss, and write/evict failures
//! are logged and handed back for callers that want to count them.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use super::backend::KvBackend;
use super::error::CacheError;
use super::keys::CacheKey;

const SOURCE: &str = "cache::store";

#[derive(Clone)]
pub struct ByteCache {
    backend: Arc<dyn KvBackend>,
}

impl ByteCache {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Returns previously stored bytes for `key`.
    ///
    /// `None` covers "never written", "expired", "dropped early by the
    /// backend" and "backend failed"; readers must handle all of them as a
    /// plain miss.
    pub async fn read(&self, key: &CacheKey) -> Option<Bytes> {
        match self.backend.get(key.as_str()).await {
            Ok(Some(value)) => {
                counter!("recache_cache_hit_total").increment(1);
                Some(value)
            }
            Ok(None) => {
                counter!("recache_cache_miss_total").increment(1);
                None
            }
            Err(source) => {
                counter!("recache_cache_backend_error_total", "op" => "read").increment(1);
                let err = CacheError::Unavailable {
                    op: "read",
                    key: key.to_string(),
                    source,
                };
                warn!(target = SOURCE, key = %key, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Stores `data` under `key` for at most `ttl`.
    pub async fn write(
        &self,
        key: &CacheKey,
        data: Bytes,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let size = data.len();
        match self.backend.put(key.as_str(), data, ttl).await {
            Ok(()) => {
                debug!(target = SOURCE, key = %key, size, ttl_secs = ttl.as_secs(), "cache entry written");
                Ok(())
            }
            Err(source) => {
                counter!("recache_cache_backend_error_total", "op" => "write").increment(1);
                let err = CacheError::Unavailable {
                    op: "write",
                    key: key.to_string(),
                    source,
                };
                warn!(target = SOURCE, key = %key, size, error = %err, "cache write failed");
                Err(err)
            }
        }
    }

    /// Drops the entry for `key`, if any.
    pub async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        match self.backend.delete(key.as_str()).await {
            Ok(()) => Ok(()),
            Err(source) => {
                counter!("recache_cache_backend_error_total", "op" => "evict").increment(1);
                let err = CacheError::Unavailable {
                    op: "evict",
                    key: key.to_string(),
                    source,
                };
                warn!(target = SOURCE, key = %key, error = %err, "cache eviction failed");
                Err(err)
            }
        }
    }
}
