//! Identity types for Wharf records

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;

/// Identifier of a record within its collection.
///
/// Store-assigned ids are UUIDv7 strings, so they sort by creation time.
/// Callers may also supply their own id when inserting. Either way the id
/// never changes once the record exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh timestamp-sortable id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a document collection ("ports", "users", ...).
///
/// Restricted to lowercase ASCII letters, digits, `_` and `-` so that a
/// collection name can never contain the `:` separator used in cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Collection(String);

impl Collection {
    /// Validate and wrap a collection name.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(name))
        } else {
            Err(ValidationError::InvalidCollection { name })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Collection::new(name).map_err(serde::de::Error::custom)
    }
}

impl TryFrom<&str> for Collection {
    type Error = ValidationError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Collection::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_sortable() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_record_id_serializes_as_plain_string() -> Result<(), serde_json::Error> {
        let id = RecordId::new("65f0c2a1");
        assert_eq!(serde_json::to_string(&id)?, "\"65f0c2a1\"");
        Ok(())
    }

    #[test]
    fn test_collection_accepts_simple_names() {
        assert!(Collection::new("ports").is_ok());
        assert!(Collection::new("user_roles-2").is_ok());
    }

    #[test]
    fn test_collection_rejects_separator_and_empty() {
        assert!(matches!(
            Collection::new("ports:1"),
            Err(ValidationError::InvalidCollection { .. })
        ));
        assert!(Collection::new("").is_err());
        assert!(Collection::new("Ports").is_err());
    }

    #[test]
    fn test_collection_deserialize_validates() {
        let ok: Result<Collection, _> = serde_json::from_str("\"roles\"");
        assert!(ok.is_ok());
        let bad: Result<Collection, _> = serde_json::from_str("\"a b\"");
        assert!(bad.is_err());
    }
}
