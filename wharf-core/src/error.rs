//! Error types for Wharf operations

use thiserror::Error;

use crate::RecordId;

/// Durable store errors. These always propagate to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Record {id} already exists in {collection}")]
    DuplicateId { collection: String, id: RecordId },

    #[error("Query failed on {collection}: {reason}")]
    QueryFailed { collection: String, reason: String },

    #[error("Corrupt record {id} in {collection}: {reason}")]
    CorruptRecord {
        collection: String,
        id: RecordId,
        reason: String,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache backend errors. Cache-aside operations log these and carry on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to serialize cache entry {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize cache entry {key}: {reason}")]
    Deserialization { key: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Natural key missing: {field}")]
    NaturalKeyMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid collection name: {name}")]
    InvalidCollection { name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Wharf errors.
#[derive(Debug, Clone, Error)]
pub enum WharfError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl WharfError {
    /// True when the durable store could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, WharfError::Storage(StorageError::Unavailable { .. }))
    }
}

/// Result type alias for Wharf operations.
pub type WharfResult<T> = Result<T, WharfError>;

// =============================================================================
// TESTS
// =============================================================================
