//! Cascading invalidation of an idiom page and its implementation pages.

use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::entities::{IdiomRecord, ImplementationRecord};

use super::keys::CacheKey;
use super::store::ByteCache;

const SOURCE: &str = "cache::invalidator";

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Every key an eviction was attempted for, parent first.
    pub attempted: Vec<CacheKey>,
    /// Keys whose eviction failed; they expire with their TTL.
    pub failed: Vec<CacheKey>,
}

impl InvalidationReport {
    pub fn evicted(&self) -> usize {
        self.attempted.len() - self.failed.len()
    }
}

#[derive(Clone)]
pub struct CacheInvalidator {
    cache: ByteCache,
}

impl CacheInvalidator {
    pub fn new(cache: ByteCache) -> Self {
        Self { cache }
    }

    /// Keys rendered for `idiom`: its own page, then one per current implementation.
    pub fn keys_for(idiom: &IdiomRecord) -> Vec<CacheKey> {
        let mut keys = Vec::with_capacity(1 + idiom.implementations.len());
        keys.push(CacheKey::for_idiom(idiom));
        keys.extend(
            idiom
                .implementations
                .iter()
                .map(|imp| CacheKey::for_implementation(idiom, imp)),
        );
        keys
    }

    /// Evicts the idiom page and every current implementation page.
    ///
    /// `idiom` must carry the full current implementation list; a page for an
    /// implementation missing from it lingers until its TTL.
    pub async fn invalidate(&self, idiom: &IdiomRecord) -> InvalidationReport {
        self.invalidate_with_removed(idiom, &[]).await
    }

    /// Like [`invalidate`](Self::invalidate), also evicting pages of
    /// implementations the current mutation is removing.
    pub async fn invalidate_with_removed(
        &self,
        idiom: &IdiomRecord,
        removed: &[ImplementationRecord],
    ) -> InvalidationReport {
        info!(
            target = SOURCE,
            idiom_id = idiom.id,
            title = %idiom.title,
            implementations = idiom.implementations.len(),
            removed = removed.len(),
            "evicting cached pages for idiom"
        );

        let mut keys = Self::keys_for(idiom);
        for imp in removed {
            let key = CacheKey::for_implementation(idiom, imp);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        self.evict_all(keys).await
    }

    async fn evict_all(&self, keys: Vec<CacheKey>) -> InvalidationReport {
        // All evictions run; a failure on one key never skips the others.
        let results = join_all(keys.iter().map(|key| self.cache.evict(key))).await;

        let failed: Vec<CacheKey> = keys
            .iter()
            .zip(results)
            .filter_map(|(key, result)| result.err().map(|_| key.clone()))
            .collect();

        if !failed.is_empty() {
            warn!(
                target = SOURCE,
                failed = failed.len(),
                attempted = keys.len(),
                keys = ?failed,
                "some evictions failed; entries will expire with their TTL"
            );
        }

        InvalidationReport {
            attempted: keys,
            failed,
        }
    }
}
