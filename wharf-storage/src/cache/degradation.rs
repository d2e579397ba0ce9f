//! Typed reporting of swallowed cache failures.
//!
//! Cache errors never fail a cache-aside operation. Each one is logged,
//! counted in [`CacheHealth`] and published as a [`CacheDegradation`] so a
//! monitoring task can observe the cache layer without parsing logs.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use wharf_core::CacheError;

/// Cache operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    /// Lookup, including undecodable or mismatched payloads.
    Read,
    /// Write-through or population after a miss.
    Write,
    /// Explicit removal after a delete.
    Invalidate,
}

impl CacheOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOperation::Read => "read",
            CacheOperation::Write => "write",
            CacheOperation::Invalidate => "invalidate",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One swallowed cache failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheDegradation {
    pub operation: CacheOperation,
    pub key: String,
    pub error: CacheError,
    pub at: DateTime<Utc>,
}

/// Running counters for the cache layer as seen by the cache-aside store.
#[derive(Debug, Default)]
pub struct CacheHealth {
    hits: AtomicU64,
    misses: AtomicU64,
    degraded_reads: AtomicU64,
    degraded_writes: AtomicU64,
    degraded_invalidations: AtomicU64,
}

/// Point-in-time copy of [`CacheHealth`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheHealthSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub degraded_reads: u64,
    pub degraded_writes: u64,
    pub degraded_invalidations: u64,
}

impl CacheHealthSnapshot {
    pub fn total_degradations(&self) -> u64 {
        self.degraded_reads + self.degraded_writes + self.degraded_invalidations
    }
}

impl CacheHealth {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degradation(&self, operation: CacheOperation) {
        let counter = match operation {
            CacheOperation::Read => &self.degraded_reads,
            CacheOperation::Write => &self.degraded_writes,
            CacheOperation::Invalidate => &self.degraded_invalidations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheHealthSnapshot {
        CacheHealthSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            degraded_reads: self.degraded_reads.load(Ordering::Relaxed),
            degraded_writes: self.degraded_writes.load(Ordering::Relaxed),
            degraded_invalidations: self.degraded_invalidations.load(Ordering::Relaxed),
        }
    }
}
