//! Gzip-compressed entries for pages that may approach the backend item limit.

use std::{
    io::{Read, Write},
    time::Duration,
};

use bytes::Bytes;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use metrics::counter;
use tracing::{debug, warn};

use super::error::CacheError;
use super::keys::CacheKey;
use super::store::ByteCache;

const SOURCE: &str = "cache::compressed";

/// Compress data using gzip.
pub fn compress(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decompress a complete gzip stream.
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    if data.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "empty gzip stream",
        ));
    }
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

#[derive(Clone)]
pub struct CompressedCache {
    inner: ByteCache,
    level: u32,
}

impl CompressedCache {
    pub fn new(inner: ByteCache, level: u32) -> Self {
        Self {
            inner,
            level: level.min(9),
        }
    }

    /// Reads and gunzips the entry for `key`.
    ///
    /// A corrupt or non-gzip entry is logged and reported as a miss; garbage is
    /// never returned.
    pub async fn read_large(&self, key: &CacheKey) -> Option<Bytes> {
        let zipped = self.inner.read(key).await?;
        match decompress(&zipped) {
            Ok(data) => {
                debug!(
                    target = SOURCE,
                    key = %key,
                    size = data.len(),
                    gzip_size = zipped.len(),
                    "read compressed entry"
                );
                Some(Bytes::from(data))
            }
            Err(source) => {
                counter!("recache_cache_corrupt_total").increment(1);
                let err = CacheError::CorruptEntry {
                    key: key.to_string(),
                    message: source.to_string(),
                };
                warn!(target = SOURCE, key = %key, error = %err, "discarding unreadable cache entry");
                None
            }
        }
    }

    /// Gzips `data` and stores it under `key`.
    ///
    /// When compression fails nothing is written: an entry under a compressed
    /// key is always gzip.
    pub async fn write_large(
        &self,
        key: &CacheKey,
        data: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let zipped = compress(data, self.level).map_err(|source| {
            let err = CacheError::Compression {
                key: key.to_string(),
                message: source.to_string(),
            };
            warn!(target = SOURCE, key = %key, error = %err, "compression failed; entry not written");
            err
        })?;

        debug!(
            target = SOURCE,
            key = %key,
            size = data.len(),
            gzip_size = zipped.len(),
            "writing compressed entry"
        );
        self.inner.write(key, Bytes::from(zipped), ttl).await
    }
}
