//! Cache layer: expiring backends and the cache-aside store.
//!
//! Backends implement [`ExpiringCache`] over opaque bytes with a TTL per
//! entry. [`CacheAsideStore`] sits in front of a [`crate::DocumentStore`]
//! and uses a backend to absorb repeated reads.
//!
//! # Keys
//!
//! [`CacheKey`] can only be derived from a validated collection name and,
//! for point entries, a record id:
//!
//! ```ignore
//! CacheKey::all(&ports);          // "ports"
//! CacheKey::record(&ports, &id);  // "ports:<id>"
//! ```
//!
//! # Staleness
//!
//! Reads return [`CacheRead<T>`], which says whether the value came from the
//! cache or the store. Cache-sourced values may lag the store by up to one
//! TTL window.

pub mod aside;
pub mod clock;
pub mod degradation;
pub mod freshness;
pub mod key;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod traits;

pub use aside::{CacheAsideStore, CacheConfig, DeleteOutcome, UpsertOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use degradation::{CacheDegradation, CacheHealth, CacheHealthSnapshot, CacheOperation};
pub use freshness::{CacheRead, ReadSource};
pub use key::CacheKey;
pub use lmdb_backend::{LmdbCache, LmdbCacheError};
pub use memory_backend::InMemoryCache;
pub use traits::{CacheStats, ExpiringCache};
