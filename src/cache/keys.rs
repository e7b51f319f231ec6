//! Cache key derivation.
//!
//! A key is the site-relative URL of the page it caches, so two entities that
//! render the same URL always share one key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    entities::{IdiomRecord, ImplementationRecord},
    slug::uri_normalize,
};

/// Identifies one cacheable rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of an idiom detail page: `/idiom/{id}/{title}`.
    pub fn idiom_page(idiom_id: i32, idiom_title: &str) -> Self {
        Self(format!("/idiom/{idiom_id}/{}", uri_normalize(idiom_title)))
    }

    /// Key of an implementation page: `/idiom/{id}/{title}/{language}`.
    pub fn impl_page(idiom_id: i32, idiom_title: &str, impl_lang: &str) -> Self {
        Self(format!(
            "/idiom/{idiom_id}/{}/{}",
            uri_normalize(idiom_title),
            uri_normalize(impl_lang)
        ))
    }

    pub fn for_idiom(idiom: &IdiomRecord) -> Self {
        Self::idiom_page(idiom.id, &idiom.title)
    }

    pub fn for_implementation(idiom: &IdiomRecord, implementation: &ImplementationRecord) -> Self {
        Self::impl_page(idiom.id, &idiom.title, &implementation.language_name)
    }

    /// Key for an already-normalized request path.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            Self("/".to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
