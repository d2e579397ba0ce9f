//! Durable document store abstraction.
//!
//! The store is the source of truth for every collection. Implementations
//! must be safe for concurrent independent access; this layer adds no
//! locking or transaction scope of its own.

use ::async_trait::async_trait;
use wharf_core::{Collection, Document, Fields, Filter, Record, RecordId, WharfResult};

/// Async document store used by the cache-aside layer.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All records in `collection` matching `filter`, in insertion order.
    async fn find(&self, collection: &Collection, filter: &Filter) -> WharfResult<Vec<Record>>;

    /// The first record matching `filter`, if any.
    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> WharfResult<Option<Record>>;

    /// Insert a document and return its id.
    ///
    /// A caller-supplied id is kept; otherwise a new UUIDv7 is assigned.
    async fn insert_one(&self, collection: &Collection, document: Document)
        -> WharfResult<RecordId>;

    /// Replace every field of the first record matching `filter`.
    ///
    /// The record id is left unchanged. Returns the number of records
    /// updated (0 or 1).
    async fn update_one(
        &self,
        collection: &Collection,
        filter: &Filter,
        fields: Fields,
    ) -> WharfResult<u64>;

    /// Delete the first record matching `filter`. Returns the number of
    /// records deleted (0 or 1).
    async fn delete_one(&self, collection: &Collection, filter: &Filter) -> WharfResult<u64>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> WharfResult<()>;
}

/// Record counts reported by a store for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub collections: u64,
    pub records: u64,
}
