//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A programming idiom together with its current implementations.
///
/// The cache only reads identities, the title and the language labels of the
/// implementations; everything else is carried for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdiomRecord {
    pub id: i32,
    pub title: String,
    pub lead_paragraph: String,
    pub version: i32,
    pub implementations: Vec<ImplementationRecord>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationRecord {
    pub id: i32,
    pub idiom_id: i32,
    /// Canonical language label, unique within one idiom (`Go`, `Rust`, `Cpp`, ...).
    pub language_name: String,
    pub imports_block: Option<String>,
    pub code_block: String,
    pub updated_at: OffsetDateTime,
}

impl IdiomRecord {
    pub fn implementation(&self, impl_id: i32) -> Option<&ImplementationRecord> {
        self.implementations.iter().find(|imp| imp.id == impl_id)
    }
}
