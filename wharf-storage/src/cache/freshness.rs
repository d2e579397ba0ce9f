//! Read results annotated with where the data came from.
//!
//! A cache-sourced value may be stale by up to one TTL window. Wrapping reads
//! in [`CacheRead`] keeps that visible to callers instead of hiding it.

use chrono::{DateTime, Utc};

/// Origin of a value returned by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from the expiring cache without touching the store.
    Cache,
    /// Loaded from the durable store.
    Store,
}

/// Result of a cache-aside read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    /// The value.
    value: T,
    /// Where it came from.
    source: ReadSource,
    /// When the read was answered.
    read_at: DateTime<Utc>,
}

impl<T> CacheRead<T> {
    /// Create a read served by the cache.
    pub fn from_cache(value: T, read_at: DateTime<Utc>) -> Self {
        Self {
            value,
            source: ReadSource::Cache,
            read_at,
        }
    }

    /// Create a read served by the durable store.
    pub fn from_store(value: T, read_at: DateTime<Utc>) -> Self {
        Self {
            value,
            source: ReadSource::Store,
            read_at,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn read_at(&self) -> DateTime<Utc> {
        self.read_at
    }

    /// Check if this was a cache hit.
    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_read_from_cache() {
        let at = Utc::now();
        let read = CacheRead::from_cache("v".to_string(), at);
        assert!(read.was_cache_hit());
        assert_eq!(read.source(), ReadSource::Cache);
        assert_eq!(read.read_at(), at);
        assert_eq!(read.value(), "v");
    }

    #[test]
    fn test_cache_read_from_store() {
        let read = CacheRead::from_store(42i32, Utc::now());
        assert!(!read.was_cache_hit());
        assert_eq!(read.into_value(), 42);
    }
}
