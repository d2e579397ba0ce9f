//! LMDB-backed expiring cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped
//! key-value store that survives process restarts.
//!
//! # Value Layout
//!
//! Each value is `[expires_at_millis: i64 LE][payload]`. Expiry is checked
//! on read against the injected clock; an expired entry is deleted and
//! reported as a miss.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get` and `stats`
//! - Write transactions for `set_with_ttl`, `delete` and expired-entry cleanup
//! - Hit/miss counters behind a `RwLock`

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use wharf_core::CacheError;

use super::clock::{expiry_millis, Clock, SystemClock};
use super::key::CacheKey;
use super::traits::{CacheStats, ExpiringCache};

/// Size of the expiry prefix on every stored value.
const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt entry: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbCacheError to CacheError.
impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::Unavailable {
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed cache.
///
/// # Example
///
/// ```ignore
/// use wharf_storage::cache::{CacheKey, ExpiringCache, LmdbCache};
///
/// let cache = LmdbCache::new("/var/lib/wharf/cache", 100)?;
/// cache.set_with_ttl(&key, payload, Duration::from_secs(3600)).await?;
/// let hit = cache.get(&key).await?;
/// ```
pub struct LmdbCache {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Time source for expiry decisions.
    clock: Arc<dyn Clock>,
    /// Hit/miss/expiry counters.
    counters: Arc<RwLock<CacheStats>>,
}

impl std::fmt::Debug for LmdbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCache")
            .field("path", &self.env.path())
            .finish_non_exhaustive()
    }
}

impl LmdbCache {
    /// Create a new LMDB cache using wall-clock time.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Database cannot be created
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        Self::with_clock(path, max_size_mb, Arc::new(SystemClock))
    }

    /// Create a new LMDB cache with an explicit clock.
    pub fn with_clock<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            clock,
            counters: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.counters.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, expired: bool) {
        if let Ok(mut stats) = self.counters.write() {
            stats.misses += 1;
            if expired {
                stats.expirations += 1;
            }
        }
    }

    /// Split a stored value into its expiry and payload.
    fn decode(key: &CacheKey, bytes: &[u8]) -> Result<(i64, Vec<u8>), LmdbCacheError> {
        if bytes.len() < HEADER_LEN {
            return Err(LmdbCacheError::Corrupt(format!(
                "{} is {} bytes",
                key,
                bytes.len()
            )));
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        Ok((i64::from_le_bytes(header), bytes[HEADER_LEN..].to_vec()))
    }

    /// Delete `key` if it is still expired at `now`.
    fn purge_expired(&self, key: &CacheKey, now: i64) -> Result<(), LmdbCacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let still_expired = match self
            .db
            .get(&wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
        {
            Some(bytes) => match Self::decode(key, bytes) {
                Ok((expires_at, _)) => now >= expires_at,
                Err(_) => true,
            },
            None => false,
        };

        if still_expired {
            self.db
                .delete(&mut wtxn, key.as_bytes())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))
    }
}

#[async_trait]
impl ExpiringCache for LmdbCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now_millis();

        let found = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            match self.db.get(&rtxn, key.as_bytes()) {
                Ok(Some(bytes)) => Some(Self::decode(key, bytes)),
                Ok(None) => None,
                Err(e) => {
                    self.record_miss(false);
                    return Err(LmdbCacheError::Transaction(e.to_string()).into());
                }
            }
        };

        match found {
            Some(Ok((expires_at, payload))) if now < expires_at => {
                self.record_hit();
                Ok(Some(payload))
            }
            Some(Ok(_)) => {
                self.purge_expired(key, now)?;
                self.record_miss(true);
                Ok(None)
            }
            Some(Err(e)) => {
                self.purge_expired(key, now)?;
                self.record_miss(false);
                Err(e.into())
            }
            None => {
                self.record_miss(false);
                Ok(None)
            }
        }
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let expires_at = expiry_millis(self.clock.now_millis(), ttl);

        let mut full_bytes = Vec::with_capacity(HEADER_LEN + value.len());
        full_bytes.extend_from_slice(&expires_at.to_le_bytes());
        full_bytes.extend_from_slice(&value);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, key.as_bytes(), &full_bytes)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .delete(&mut wtxn, key.as_bytes())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut entry_count = 0u64;
        let mut memory_bytes = 0u64;
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
        for (_, value) in iter.flatten() {
            entry_count += 1;
            memory_bytes += value.len().saturating_sub(HEADER_LEN) as u64;
        }

        let counters = self
            .counters
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();

        Ok(CacheStats {
            entry_count,
            memory_bytes,
            ..counters
        })
    }
}
