//! Rendered page cache.
//!
//! Layers, leaf first:
//!
//! - [`KvBackend`]: best-effort key-value store with TTL; entries may vanish anytime
//! - [`ByteCache`]: read/write/evict over a backend, never failing a reader
//! - [`CompressedCache`]: gzip on write, gunzip on read, corruption reads as a miss
//! - [`PageCache`]: page-level facade applying the freshness window and the
//!   configured encoding
//! - [`CacheInvalidator`]: evicts an idiom page and all of its implementation pages
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! freshness_ttl_seconds = 86400
//! refresh_skew_seconds = 600
//! compress_pages = false
//! ```

mod backend;
mod compressed;
mod config;
mod error;
mod invalidator;
mod keys;
mod lock;
mod page;
mod store;

pub use backend::{KvBackend, MemoryKvStore};
pub use compressed::{CompressedCache, compress, decompress};
pub use config::CacheConfig;
pub use error::{BackendError, CacheError};
pub use invalidator::{CacheInvalidator, InvalidationReport};
pub use keys::CacheKey;
pub use page::PageCache;
pub use store::ByteCache;
