//! In-process expiring cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use wharf_core::CacheError;

use super::clock::{expiry_millis, Clock, SystemClock};
use super::key::CacheKey;
use super::traits::{CacheStats, ExpiringCache};

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    expires_at_millis: i64,
}

/// HashMap-backed cache with lazy expiry.
///
/// Expired entries are removed when they are next read.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Remaining lifetime of an entry, if it exists and has not expired.
    pub fn ttl_remaining(&self, key: &CacheKey) -> Result<Option<Duration>, CacheError> {
        let now = self.clock.now_millis();
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key.as_str()).and_then(|entry| {
            let left = entry.expires_at_millis.saturating_sub(now);
            (left > 0).then(|| Duration::from_millis(left as u64))
        }))
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> CacheError {
    CacheError::Unavailable {
        reason: "cache lock poisoned".to_string(),
    }
}

#[async_trait]
impl ExpiringCache for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now_millis();
        {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            match entries.get(key.as_str()) {
                Some(entry) if now < entry.expires_at_millis => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.payload.clone()));
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return Ok(None);
                }
            }
        }

        // Expired: drop it unless a writer refreshed it in the meantime.
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if let Some(entry) = entries.get(key.as_str()) {
            if now >= entry.expires_at_millis {
                entries.remove(key.as_str());
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at_millis = expiry_millis(self.clock.now_millis(), ttl);
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(
            key.as_str().to_string(),
            Entry {
                payload: value,
                expires_at_millis,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key.as_str());
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: entries.len() as u64,
            memory_bytes: entries.values().map(|e| e.payload.len() as u64).sum(),
            expirations: self.expirations.load(Ordering::Relaxed),
        })
    }
}
