use thiserror::Error;

/// Failure reported by a [`KvBackend`](super::KvBackend) implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("item of {size} bytes exceeds the {limit} byte item limit")]
    ItemTooLarge { size: usize, limit: usize },
}

impl BackendError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Cache-layer failures. None of these ever reach a page reader: reads degrade
/// to a miss and writes/evictions are best-effort.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable during {op} of `{key}`")]
    Unavailable {
        op: &'static str,
        key: String,
        #[source]
        source: BackendError,
    },
    #[error("corrupt cache entry `{key}`: {message}")]
    CorruptEntry { key: String, message: String },
    #[error("failed to compress entry `{key}`: {message}")]
    Compression { key: String, message: String },
}
