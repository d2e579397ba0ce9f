//! In-memory document store.
//!
//! Used by tests and by the API when no database is configured. Records
//! are kept per collection in insertion order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use wharf_core::{
    Collection, Document, Fields, Filter, Record, RecordId, StorageError, WharfError, WharfResult,
};

use crate::document::{DocumentStore, StoreStatistics};

type Collections = HashMap<Collection, Vec<Record>>;

/// In-memory document store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> WharfResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| WharfError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> WharfResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| WharfError::Storage(StorageError::LockPoisoned))
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: &Collection) -> WharfResult<usize> {
        Ok(self.read()?.get(collection).map_or(0, Vec::len))
    }

    /// Collection and record totals.
    pub fn statistics(&self) -> WharfResult<StoreStatistics> {
        let guard = self.read()?;
        Ok(StoreStatistics {
            collections: guard.len() as u64,
            records: guard.values().map(|records| records.len() as u64).sum(),
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, collection: &Collection, filter: &Filter) -> WharfResult<Vec<Record>> {
        let guard = self.read()?;
        Ok(guard
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> WharfResult<Option<Record>> {
        let guard = self.read()?;
        Ok(guard
            .get(collection)
            .and_then(|records| records.iter().find(|record| filter.matches(record)))
            .cloned())
    }

    async fn insert_one(
        &self,
        collection: &Collection,
        document: Document,
    ) -> WharfResult<RecordId> {
        let (id, fields) = document.into_parts();
        let id = id.unwrap_or_else(RecordId::generate);

        let mut guard = self.write()?;
        let records = guard.entry(collection.clone()).or_default();
        if records.iter().any(|record| record.id() == &id) {
            return Err(WharfError::Storage(StorageError::DuplicateId {
                collection: collection.to_string(),
                id,
            }));
        }
        records.push(Record::new(id.clone(), fields));
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &Collection,
        filter: &Filter,
        fields: Fields,
    ) -> WharfResult<u64> {
        let mut guard = self.write()?;
        let Some(records) = guard.get_mut(collection) else {
            return Ok(0);
        };
        match records.iter_mut().find(|record| filter.matches(record)) {
            Some(record) => {
                *record = Record::new(record.id().clone(), fields);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &Collection, filter: &Filter) -> WharfResult<u64> {
        let mut guard = self.write()?;
        let Some(records) = guard.get_mut(collection) else {
            return Ok(0);
        };
        match records.iter().position(|record| filter.matches(record)) {
            Some(index) => {
                records.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn health_check(&self) -> WharfResult<()> {
        self.read().map(|_| ())
    }
}
