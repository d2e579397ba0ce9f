//! Expiring cache backend trait and statistics.

use std::time::Duration;

use async_trait::async_trait;
use wharf_core::CacheError;

use super::key::CacheKey;

/// Expiring key-value cache for serialized records.
///
/// Implementations must be thread-safe. Values are opaque bytes; the
/// cache-aside layer stores JSON text. An entry written with a TTL must be
/// reported as missing by any read at or after `written_at + ttl`.
#[async_trait]
pub trait ExpiringCache: Send + Sync {
    /// Get the payload for a key, or None if absent or expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a payload that expires after `ttl`. Overwrites any existing entry.
    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats, CacheError>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired entries.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate payload size in bytes.
    pub memory_bytes: u64,
    /// Number of entries dropped because their TTL had passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
