//! Cache-aside store over a durable document store and an expiring cache.
//!
//! Reads check the cache first, fall back to the store on a miss and
//! populate the cache with what the store returned. Writes commit to the
//! store first and then refresh the point entry for the written record.
//!
//! # Consistency
//!
//! - The `"<collection>"` all-records entry is never touched by writes. It
//!   can serve a pre-write snapshot for at most one `entry_ttl`.
//! - Missing records and empty scans are not cached.
//! - A failed cache step never fails the operation. It is logged, counted
//!   and published on the degradation channel.
//! - Store failures propagate unchanged. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use wharf_core::{
    is_blank, CacheError, Collection, Document, Filter, Record, RecordId, ValidationError,
    WharfError, WharfResult,
};

use super::clock::{Clock, SystemClock};
use super::degradation::{CacheDegradation, CacheHealth, CacheHealthSnapshot, CacheOperation};
use super::freshness::CacheRead;
use super::key::CacheKey;
use super::traits::{CacheStats, ExpiringCache};
use crate::document::DocumentStore;

/// Configuration for the cache-aside store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for every cache entry written by the store.
    pub entry_ttl: Duration,
    /// Buffered degradation events per subscriber before old ones are dropped.
    pub degradation_channel_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(3600), // 1 hour
            degradation_channel_capacity: 64,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    /// Set the degradation channel capacity.
    pub fn with_degradation_capacity(mut self, capacity: usize) -> Self {
        self.degradation_channel_capacity = capacity;
        self
    }
}

/// Result of an upsert or insert.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertOutcome {
    /// True when a new record was inserted.
    pub created: bool,
    /// The record as committed to the store.
    pub stored: Record,
    /// True when the point cache entry was refreshed.
    pub cache_refreshed: bool,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// True when the store removed a record.
    pub deleted: bool,
    /// True when the point cache entry was removed.
    pub cache_invalidated: bool,
}

/// Cache-aside store.
///
/// # Type Parameters
///
/// - `S`: The durable document store (source of truth)
/// - `C`: The expiring cache
///
/// Both are shared through `Arc` and may be trait objects.
///
/// # Example
///
/// ```ignore
/// let store = CacheAsideStore::new(
///     Arc::new(InMemoryDocumentStore::new()),
///     Arc::new(InMemoryCache::new()),
///     CacheConfig::default(),
/// );
///
/// let outcome = store.upsert_by_natural_key(&ports, "portCode", doc).await?;
/// let read = store.get_by_id(&ports, outcome.stored.id()).await?;
/// ```
pub struct CacheAsideStore<S, C>
where
    S: DocumentStore + ?Sized,
    C: ExpiringCache + ?Sized,
{
    /// The durable store.
    store: Arc<S>,
    /// The cache backend.
    cache: Arc<C>,
    /// Time source for read and degradation timestamps.
    clock: Arc<dyn Clock>,
    /// Cache configuration.
    config: CacheConfig,
    /// Publisher for swallowed cache failures.
    degradations: broadcast::Sender<CacheDegradation>,
    /// Hit/miss/degradation counters.
    health: Arc<CacheHealth>,
}

impl<S, C> CacheAsideStore<S, C>
where
    S: DocumentStore + ?Sized,
    C: ExpiringCache + ?Sized,
{
    /// Create a new cache-aside store.
    pub fn new(store: Arc<S>, cache: Arc<C>, config: CacheConfig) -> Self {
        Self::with_clock(store, cache, Arc::new(SystemClock), config)
    }

    /// Create a new cache-aside store with an explicit clock.
    pub fn with_clock(
        store: Arc<S>,
        cache: Arc<C>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        let (degradations, _) = broadcast::channel(config.degradation_channel_capacity.max(1));
        Self {
            store,
            cache,
            clock,
            config,
            degradations,
            health: Arc::new(CacheHealth::default()),
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a reference to the durable store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Receive every cache failure swallowed from now on.
    pub fn subscribe_degradations(&self) -> broadcast::Receiver<CacheDegradation> {
        self.degradations.subscribe()
    }

    /// Current hit/miss/degradation counters.
    pub fn health(&self) -> CacheHealthSnapshot {
        self.health.snapshot()
    }

    /// Statistics reported by the cache backend itself.
    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats().await
    }

    /// Check that the durable store is reachable.
    pub async fn health_check(&self) -> WharfResult<()> {
        self.store.health_check().await
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get one record, from the cache when possible.
    ///
    /// Returns `Ok(None)` when the store has no such record. That result is
    /// not cached, so a later insert of the same id is observed immediately.
    pub async fn get_by_id(
        &self,
        collection: &Collection,
        id: &RecordId,
    ) -> WharfResult<Option<CacheRead<Record>>> {
        let key = CacheKey::record(collection, id);

        if let Some(record) = self.read_cached::<Record>(&key).await {
            if record.id() == id {
                self.health.record_hit();
                debug!(key = %key, "cache hit");
                return Ok(Some(CacheRead::from_cache(record, self.clock.now())));
            }
            self.degrade(
                CacheOperation::Read,
                &key,
                CacheError::Deserialization {
                    key: key.to_string(),
                    reason: format!("payload carries id {}", record.id()),
                },
            );
        }

        self.health.record_miss();
        debug!(key = %key, "cache miss");

        let found = self
            .store
            .find_one(collection, &Filter::Id(id.clone()))
            .await
            .map_err(|e| store_failure("find_one", collection, e))?;

        match found {
            Some(record) => {
                self.write_through(&key, &record).await;
                Ok(Some(CacheRead::from_store(record, self.clock.now())))
            }
            None => Ok(None),
        }
    }

    /// Get every record of a collection, from the cache when possible.
    ///
    /// An empty scan is returned but not cached.
    pub async fn get_all(&self, collection: &Collection) -> WharfResult<CacheRead<Vec<Record>>> {
        let key = CacheKey::all(collection);

        if let Some(records) = self.read_cached::<Vec<Record>>(&key).await {
            self.health.record_hit();
            debug!(key = %key, count = records.len(), "cache hit");
            return Ok(CacheRead::from_cache(records, self.clock.now()));
        }

        self.health.record_miss();
        debug!(key = %key, "cache miss");

        let records = self
            .store
            .find(collection, &Filter::All)
            .await
            .map_err(|e| store_failure("find", collection, e))?;

        if !records.is_empty() {
            self.write_through(&key, &records).await;
        }
        Ok(CacheRead::from_store(records, self.clock.now()))
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Update the record whose `natural_key` field matches, or insert one.
    ///
    /// On update every field is replaced and the existing id is kept. The
    /// natural key must be present and non-empty. Required-field checks
    /// beyond that are the caller's job.
    pub async fn upsert_by_natural_key(
        &self,
        collection: &Collection,
        natural_key: &str,
        document: Document,
    ) -> WharfResult<UpsertOutcome> {
        let key_value = match document.get(natural_key) {
            value if is_blank(value) => None,
            value => value.cloned(),
        };
        let Some(key_value) = key_value else {
            return Err(ValidationError::NaturalKeyMissing {
                field: natural_key.to_string(),
            }
            .into());
        };

        let existing = self
            .store
            .find_one(collection, &Filter::field_eq(natural_key, key_value))
            .await
            .map_err(|e| store_failure("find_one", collection, e))?;

        let (stored, created) = match existing {
            Some(existing) => {
                let id = existing.id().clone();
                let (_, fields) = document.into_parts();
                let updated = self
                    .store
                    .update_one(collection, &Filter::Id(id.clone()), fields.clone())
                    .await
                    .map_err(|e| store_failure("update_one", collection, e))?;

                if updated == 0 {
                    // Deleted between lookup and update.
                    (self.insert_document(collection, Document::new(fields)).await?, true)
                } else {
                    (Record::new(id, fields), false)
                }
            }
            None => (self.insert_document(collection, document).await?, true),
        };

        let cache_refreshed = self
            .write_through(&CacheKey::record(collection, stored.id()), &stored)
            .await;

        debug!(
            collection = %collection,
            id = %stored.id(),
            created,
            cache_refreshed,
            "upserted record"
        );

        Ok(UpsertOutcome {
            created,
            stored,
            cache_refreshed,
        })
    }

    /// Insert a record unconditionally, for collections without a natural key.
    pub async fn insert(
        &self,
        collection: &Collection,
        document: Document,
    ) -> WharfResult<UpsertOutcome> {
        let stored = self.insert_document(collection, document).await?;
        let cache_refreshed = self
            .write_through(&CacheKey::record(collection, stored.id()), &stored)
            .await;

        debug!(collection = %collection, id = %stored.id(), cache_refreshed, "inserted record");

        Ok(UpsertOutcome {
            created: true,
            stored,
            cache_refreshed,
        })
    }

    /// Delete a record and drop its point cache entry.
    ///
    /// When nothing was deleted the cache is left untouched.
    pub async fn delete_by_id(
        &self,
        collection: &Collection,
        id: &RecordId,
    ) -> WharfResult<DeleteOutcome> {
        let count = self
            .store
            .delete_one(collection, &Filter::Id(id.clone()))
            .await
            .map_err(|e| store_failure("delete_one", collection, e))?;

        let cache_invalidated = if count == 1 {
            self.invalidate(&CacheKey::record(collection, id)).await
        } else {
            false
        };

        debug!(collection = %collection, id = %id, count, cache_invalidated, "deleted record");

        Ok(DeleteOutcome {
            deleted: count > 0,
            cache_invalidated,
        })
    }

    // ========================================================================
    // CACHE STEPS
    // ========================================================================

    async fn insert_document(
        &self,
        collection: &Collection,
        document: Document,
    ) -> WharfResult<Record> {
        let fields = document.fields().clone();
        let id = self
            .store
            .insert_one(collection, document)
            .await
            .map_err(|e| store_failure("insert_one", collection, e))?;
        Ok(Record::new(id, fields))
    }

    /// Decoded cache payload, or None on miss or any cache failure.
    async fn read_cached<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.degrade(CacheOperation::Read, key, e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.degrade(
                    CacheOperation::Read,
                    key,
                    CacheError::Deserialization {
                        key: key.to_string(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }

    /// Serialize and store a value with the configured TTL.
    async fn write_through<T: Serialize + ?Sized + Sync>(&self, key: &CacheKey, value: &T) -> bool {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.degrade(
                    CacheOperation::Write,
                    key,
                    CacheError::Serialization {
                        key: key.to_string(),
                        reason: e.to_string(),
                    },
                );
                return false;
            }
        };

        match self
            .cache
            .set_with_ttl(key, bytes, self.config.entry_ttl)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                self.degrade(CacheOperation::Write, key, e);
                false
            }
        }
    }

    async fn invalidate(&self, key: &CacheKey) -> bool {
        match self.cache.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                self.degrade(CacheOperation::Invalidate, key, e);
                false
            }
        }
    }

    fn degrade(&self, operation: CacheOperation, key: &CacheKey, error: CacheError) {
        warn!(
            operation = %operation,
            key = %key,
            error = %error,
            "cache operation failed, continuing without cache"
        );
        self.health.record_degradation(operation);
        // No subscribers is fine.
        let _ = self.degradations.send(CacheDegradation {
            operation,
            key: key.to_string(),
            error,
            at: self.clock.now(),
        });
    }
}

fn store_failure(operation: &str, collection: &Collection, e: WharfError) -> WharfError {
    error!(operation, collection = %collection, error = %e, "document store operation failed");
    e
}

impl<S, C> Clone for CacheAsideStore<S, C>
where
    S: DocumentStore + ?Sized,
    C: ExpiringCache + ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            degradations: self.degradations.clone(),
            health: Arc::clone(&self.health),
        }
    }
}
