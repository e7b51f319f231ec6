//! Cache configuration.
//!
//! Controls the freshness window, keep-warm skew and page encoding via `recache.toml`.

use std::{num::NonZeroUsize, time::Duration};

use serde::Deserialize;

const DEFAULT_FRESHNESS_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_REFRESH_SKEW_SECS: u64 = 10 * 60;
const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;
/// Per-item ceiling of the backing store (memcache-style 1 MiB).
const DEFAULT_ITEM_SIZE_LIMIT_BYTES: usize = 1024 * 1024;

/// Cache configuration from `recache.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied to every regenerated page.
    pub freshness_ttl_secs: u64,
    /// Offset added to the freshness window for the keep-warm job.
    pub refresh_skew_secs: u64,
    /// Store pages gzip-compressed.
    pub compress_pages: bool,
    /// Gzip level, 0-9.
    pub compression_level: u32,
    /// Maximum entries held by the in-memory backend.
    pub memory_capacity: usize,
    /// Largest single item the backend accepts.
    pub item_size_limit_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_ttl_secs: DEFAULT_FRESHNESS_TTL_SECS,
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            compress_pages: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            item_size_limit_bytes: DEFAULT_ITEM_SIZE_LIMIT_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            freshness_ttl_secs: settings.freshness_ttl.as_secs(),
            refresh_skew_secs: settings.refresh_skew.as_secs(),
            compress_pages: settings.compress_pages,
            compression_level: settings.compression_level,
            memory_capacity: settings.memory_capacity.get(),
            item_size_limit_bytes: settings.item_size_limit_bytes.get(),
        }
    }
}

impl CacheConfig {
    /// TTL written with every regenerated page.
    pub fn freshness_ttl(&self) -> Duration {
        Duration::from_secs(self.freshness_ttl_secs)
    }

    /// Delay of the keep-warm job: one freshness window plus the skew.
    pub fn keep_warm_delay(&self) -> Duration {
        Duration::from_secs(self.freshness_ttl_secs.saturating_add(self.refresh_skew_secs))
    }

    /// Gzip level clamped to the valid range.
    pub fn compression_level(&self) -> u32 {
        self.compression_level.min(9)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
