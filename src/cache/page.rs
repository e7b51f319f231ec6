//! Page-level cache facade.
//!
//! Every page entry in one deployment uses the same encoding, chosen by
//! `cache.compress_pages`, so readers never have to guess whether an entry is
//! gzip.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use super::backend::KvBackend;
use super::compressed::CompressedCache;
use super::config::CacheConfig;
use super::error::CacheError;
use super::keys::CacheKey;
use super::store::ByteCache;

#[derive(Clone)]
pub struct PageCache {
    bytes: ByteCache,
    compressed: CompressedCache,
    compress_pages: bool,
    freshness_ttl: Duration,
}

impl PageCache {
    pub fn new(backend: Arc<dyn KvBackend>, config: &CacheConfig) -> Self {
        let bytes = ByteCache::new(backend);
        let compressed = CompressedCache::new(bytes.clone(), config.compression_level());
        Self {
            bytes,
            compressed,
            compress_pages: config.compress_pages,
            freshness_ttl: config.freshness_ttl(),
        }
    }

    pub async fn read_page(&self, key: &CacheKey) -> Option<Bytes> {
        if self.compress_pages {
            self.compressed.read_large(key).await
        } else {
            self.bytes.read(key).await
        }
    }

    /// Writes a freshly rendered page with the freshness window, replacing any
    /// current entry.
    pub async fn write_page(&self, key: &CacheKey, page: Bytes) -> Result<(), CacheError> {
        if self.compress_pages {
            self.compressed
                .write_large(key, &page, self.freshness_ttl)
                .await
        } else {
            self.bytes.write(key, page, self.freshness_ttl).await
        }
    }

    pub fn byte_cache(&self) -> &ByteCache {
        &self.bytes
    }

    pub fn freshness_ttl(&self) -> Duration {
        self.freshness_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKvStore;

    fn page_cache(compress_pages: bool) -> PageCache {
        let config = CacheConfig {
            compress_pages,
            ..Default::default()
        };
        PageCache::new(Arc::new(MemoryKvStore::new(&config)), &config)
    }

    #[tokio::test]
    async fn plain_pages_round_trip() {
        let cache = page_cache(false);
        let key = CacheKey::idiom_page(1, "Print Hello World");

        cache
            .write_page(&key, Bytes::from_static(b"<h1>Hello</h1>"))
            .await
            .expect("write");

        assert_eq!(
            cache.byte_cache().read(&key).await,
            Some(Bytes::from_static(b"<h1>Hello</h1>"))
        );
        assert_eq!(
            cache.read_page(&key).await,
            Some(Bytes::from_static(b"<h1>Hello</h1>"))
        );
    }

    #[tokio::test]
    async fn compressed_pages_round_trip() {
        let cache = page_cache(true);
        let key = CacheKey::idiom_page(1, "Print Hello World");

        cache
            .write_page(&key, Bytes::from_static(b"<h1>Hello</h1>"))
            .await
            .expect("write");

        let raw = cache.byte_cache().read(&key).await.expect("raw entry");
        assert_ne!(raw.as_ref(), b"<h1>Hello</h1>");
        assert_eq!(
            cache.read_page(&key).await,
            Some(Bytes::from_static(b"<h1>Hello</h1>"))
        );
    }

    #[tokio::test]
    async fn compression_lets_large_pages_fit_the_item_limit() {
        let config = CacheConfig {
            compress_pages: true,
            item_size_limit_bytes: 64 * 1024,
            ..Default::default()
        };
        let cache = PageCache::new(Arc::new(MemoryKvStore::new(&config)), &config);
        let key = CacheKey::idiom_page(2, "Large page");
        let page = Bytes::from("<tr><td>impl</td></tr>".repeat(10_000));
        assert!(page.len() > config.item_size_limit_bytes);

        cache.write_page(&key, page.clone()).await.expect("write");

        assert_eq!(cache.read_page(&key).await, Some(page));
    }
}
