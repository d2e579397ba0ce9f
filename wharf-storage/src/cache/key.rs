//! Collection-scoped cache keys.
//!
//! A key can only be built from a validated [`Collection`], optionally
//! narrowed to one record id. Collection names cannot contain `:`, so the
//! all-records key of one collection never collides with a point key.

use std::fmt;

use wharf_core::{Collection, RecordId};

/// Separator between collection and record id.
const SEPARATOR: char = ':';

/// Cache key for either a whole collection or a single record.
///
/// # Format
///
/// - `"<collection>"` for the all-records entry
/// - `"<collection>:<id>"` for a single record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    encoded: String,
}

impl CacheKey {
    /// Key for the all-records entry of a collection.
    pub fn all(collection: &Collection) -> Self {
        Self {
            encoded: collection.as_str().to_string(),
        }
    }

    /// Key for a single record.
    pub fn record(collection: &Collection, id: &RecordId) -> Self {
        Self {
            encoded: format!("{}{}{}", collection.as_str(), SEPARATOR, id.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Bytes used by binary backends.
    pub fn as_bytes(&self) -> &[u8] {
        self.encoded.as_bytes()
    }

    /// True for the all-records entry.
    pub fn is_collection_key(&self) -> bool {
        !self.encoded.contains(SEPARATOR)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}
