//! Wharf Storage - Document Store, Expiring Cache and Cache-Aside Store
//!
//! Defines the two collaborator interfaces (durable document store and
//! expiring cache), in-process implementations of both, an LMDB cache, and
//! the generic [`CacheAsideStore`] that mediates between them. The
//! PostgreSQL store lives in wharf-api.

pub mod cache;
pub mod document;
pub mod memory;

pub use document::{DocumentStore, StoreStatistics};
pub use memory::InMemoryDocumentStore;

// Re-export cache types for API integration
pub use cache::{
    CacheAsideStore, CacheConfig, CacheDegradation, CacheHealthSnapshot, CacheKey,
    CacheOperation, CacheRead, CacheStats, Clock, DeleteOutcome, ExpiringCache, InMemoryCache,
    LmdbCache, LmdbCacheError, ManualClock, ReadSource, SystemClock, UpsertOutcome,
};

pub use wharf_core::Filter;
