//! Wharf Test Utilities
//!
//! Shared test infrastructure for the Wharf workspace:
//! - Instrumented fakes for the document store and the expiring cache
//! - Proptest generators for documents and field values
//! - Fixtures for the ports, users and roles collections
//! - Assertions for Wharf results and cache reads

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

// Re-export core types for convenience
pub use wharf_core::{
    CacheError, Collection, Document, Fields, Filter, Record, RecordId, StorageError,
    ValidationError, WharfError, WharfResult,
};
pub use wharf_storage::{
    CacheAsideStore, CacheConfig, CacheKey, CacheRead, CacheStats, DocumentStore, ExpiringCache,
    InMemoryCache, InMemoryDocumentStore, ManualClock, ReadSource,
};

// ============================================================================
// COUNTING DOCUMENT STORE
// ============================================================================

/// Number of calls made to each store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub find: u64,
    pub find_one: u64,
    pub insert_one: u64,
    pub update_one: u64,
    pub delete_one: u64,
}

impl StoreCalls {
    /// Calls that read from the store.
    pub fn reads(&self) -> u64 {
        self.find + self.find_one
    }

    /// Every call.
    pub fn total(&self) -> u64 {
        self.reads() + self.insert_one + self.update_one + self.delete_one
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    find: AtomicU64,
    find_one: AtomicU64,
    insert_one: AtomicU64,
    update_one: AtomicU64,
    delete_one: AtomicU64,
}

/// Document store wrapper that counts calls and can simulate an outage.
#[derive(Debug, Default)]
pub struct CountingDocumentStore {
    inner: InMemoryDocumentStore,
    counters: CallCounters,
    unavailable: AtomicBool,
}

impl CountingDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of call counts so far.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            find: self.counters.find.load(Ordering::SeqCst),
            find_one: self.counters.find_one.load(Ordering::SeqCst),
            insert_one: self.counters.insert_one.load(Ordering::SeqCst),
            update_one: self.counters.update_one.load(Ordering::SeqCst),
            delete_one: self.counters.delete_one.load(Ordering::SeqCst),
        }
    }

    /// Reset all call counts to zero.
    pub fn reset_calls(&self) {
        for counter in [
            &self.counters.find,
            &self.counters.find_one,
            &self.counters.insert_one,
            &self.counters.update_one,
            &self.counters.delete_one,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// Make every following call fail with `StorageError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The wrapped store, for seeding data without touching the counters.
    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    fn enter(&self, counter: &AtomicU64) -> WharfResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "simulated outage".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for CountingDocumentStore {
    async fn find(&self, collection: &Collection, filter: &Filter) -> WharfResult<Vec<Record>> {
        self.enter(&self.counters.find)?;
        self.inner.find(collection, filter).await
    }

    async fn find_one(
        &self,
        collection: &Collection,
        filter: &Filter,
    ) -> WharfResult<Option<Record>> {
        self.enter(&self.counters.find_one)?;
        self.inner.find_one(collection, filter).await
    }

    async fn insert_one(
        &self,
        collection: &Collection,
        document: Document,
    ) -> WharfResult<RecordId> {
        self.enter(&self.counters.insert_one)?;
        self.inner.insert_one(collection, document).await
    }

    async fn update_one(
        &self,
        collection: &Collection,
        filter: &Filter,
        fields: Fields,
    ) -> WharfResult<u64> {
        self.enter(&self.counters.update_one)?;
        self.inner.update_one(collection, filter, fields).await
    }

    async fn delete_one(&self, collection: &Collection, filter: &Filter) -> WharfResult<u64> {
        self.enter(&self.counters.delete_one)?;
        self.inner.delete_one(collection, filter).await
    }

    async fn health_check(&self) -> WharfResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "simulated outage".to_string(),
            }
            .into());
        }
        self.inner.health_check().await
    }
}

// ============================================================================
// FLAKY CACHE
// ============================================================================

/// In-memory cache whose reads, writes and deletes can be made to fail.
#[derive(Debug)]
pub struct FlakyCache {
    inner: InMemoryCache,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyCache {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inner: InMemoryCache::with_clock(Arc::new(clock)),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Fail every operation.
    pub fn fail_all(&self, fail: bool) {
        self.fail_reads(fail);
        self.fail_writes(fail);
        self.fail_deletes(fail);
    }

    /// Write raw bytes under a key, bypassing failure injection.
    pub async fn plant(&self, key: &CacheKey, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set_with_ttl(key, bytes, ttl).await
    }

    /// Remaining TTL of a key, bypassing failure injection.
    pub fn ttl_remaining(&self, key: &CacheKey) -> Result<Option<Duration>, CacheError> {
        self.inner.ttl_remaining(key)
    }

    /// Whether a live entry exists, bypassing failure injection and stats.
    pub fn contains(&self, key: &CacheKey) -> bool {
        matches!(self.inner.ttl_remaining(key), Ok(Some(_)))
    }
}

fn injected() -> CacheError {
    CacheError::Unavailable {
        reason: "injected failure".to_string(),
    }
}

#[async_trait]
impl ExpiringCache for FlakyCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.get(key).await
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete(key).await
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.inner.stats().await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest generators for Wharf documents.

    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::*;

    /// Generate a scalar JSON field value.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-zA-Z0-9 ]{1,24}".prop_map(Value::String),
            any::<i32>().prop_map(|n| json!(n)),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    /// Generate a field value, scalar or one level of nesting.
    pub fn arb_field_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            3 => arb_scalar(),
            1 => proptest::collection::btree_map("[a-z]{1,6}", arb_scalar(), 0..3)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    }

    /// Generate a field name that is never the reserved `id`.
    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z]{0,10}".prop_filter("reserved", |name| name != "id")
    }

    /// Generate a field map.
    pub fn arb_fields() -> impl Strategy<Value = Fields> {
        proptest::collection::btree_map(arb_field_name(), arb_field_value(), 0..6)
            .prop_map(|m| m.into_iter().collect())
    }

    /// Generate a non-empty natural-key value such as a port code.
    pub fn arb_code() -> impl Strategy<Value = String> {
        "[A-Z]{2}[A-Z0-9]{3}"
    }

    /// Generate a document carrying `key_field` set to a generated code.
    pub fn arb_keyed_document(key_field: &'static str) -> impl Strategy<Value = (String, Document)> {
        (arb_code(), arb_fields()).prop_map(move |(code, mut fields)| {
            fields.insert(key_field.to_string(), Value::String(code.clone()));
            (code, Document::new(fields))
        })
    }

    /// Generate a record id.
    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        "[a-z0-9]{4,16}".prop_map(RecordId::new)
    }

    /// Generate a TTL between one second and a day.
    pub fn arb_ttl() -> impl Strategy<Value = Duration> {
        (1u64..=86_400).prop_map(Duration::from_secs)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common scenarios.

    use chrono::TimeZone;
    use serde_json::{json, Value};

    use super::*;

    pub fn ports() -> Collection {
        Collection::new("ports").unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn users() -> Collection {
        Collection::new("users").unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn roles() -> Collection {
        Collection::new("roles").unwrap_or_else(|e| panic!("{e}"))
    }

    fn object(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be an object, got {other}"),
        }
    }

    /// A complete port document.
    pub fn port(code: &str, name: &str) -> Document {
        Document::new(object(json!({
            "portCode": code,
            "portName": name,
            "connectionType": "sea",
        })))
    }

    /// A complete user document with a plaintext password.
    pub fn user(name: &str, email: &str) -> Document {
        Document::new(object(json!({
            "name": name,
            "email": email,
            "password": "hunter2",
        })))
    }

    /// A role document.
    pub fn role(name: &str, active: bool) -> Document {
        Document::new(object(json!({
            "roleName": name,
            "isActive": active,
        })))
    }

    /// Fixed starting instant for manual clocks.
    pub fn epoch() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Cache-aside store wired to instrumented fakes.
    pub struct Harness {
        pub aside: CacheAsideStore<CountingDocumentStore, FlakyCache>,
        pub store: Arc<CountingDocumentStore>,
        pub cache: Arc<FlakyCache>,
        pub clock: ManualClock,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(CacheConfig::default())
        }

        pub fn with_config(config: CacheConfig) -> Self {
            let clock = ManualClock::new(epoch());
            let store = Arc::new(CountingDocumentStore::new());
            let cache = Arc::new(FlakyCache::new(clock.clone()));
            let aside = CacheAsideStore::with_clock(
                Arc::clone(&store),
                Arc::clone(&cache),
                Arc::new(clock.clone()),
                config,
            );
            Self {
                aside,
                store,
                cache,
                clock,
            }
        }
    }

    impl Default for Harness {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Wharf results and cache reads.

    use super::*;

    /// Assert that a WharfResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &WharfResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a WharfResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &WharfResult<T>) {
        match result {
            Err(WharfError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a WharfResult is a NaturalKeyMissing error for `field`.
    #[track_caller]
    pub fn assert_natural_key_missing<T: std::fmt::Debug>(result: &WharfResult<T>, field: &str) {
        match result {
            Err(WharfError::Validation(ValidationError::NaturalKeyMissing { field: f })) => {
                assert_eq!(f, field, "Wrong field in NaturalKeyMissing");
            }
            other => panic!("Expected NaturalKeyMissing for {}, got: {:?}", field, other),
        }
    }

    /// Assert that a WharfResult is a store outage.
    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &WharfResult<T>) {
        match result {
            Err(WharfError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected store Unavailable, got: {:?}", other),
        }
    }

    /// Assert that a read was served by the cache.
    #[track_caller]
    pub fn assert_from_cache<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert_eq!(
            read.source(),
            ReadSource::Cache,
            "Expected cache hit, got store read: {:?}",
            read
        );
    }

    /// Assert that a read was served by the store.
    #[track_caller]
    pub fn assert_from_store<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert_eq!(
            read.source(),
            ReadSource::Store,
            "Expected store read, got cache hit: {:?}",
            read
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_counting_store_counts_and_fails_on_demand() {
        let store = CountingDocumentStore::new();
        let ports = fixtures::ports();

        let id = store
            .insert_one(&ports, fixtures::port("NLRTM", "Rotterdam"))
            .await
            .expect("insert should succeed");
        let found = store
            .find_one(&ports, &Filter::Id(id))
            .await
            .expect("find should succeed");
        assert!(found.is_some());
        assert_eq!(store.calls().insert_one, 1);
        assert_eq!(store.calls().reads(), 1);

        store.set_unavailable(true);
        let result = store.find(&ports, &Filter::All).await;
        assertions::assert_store_unavailable(&result);
        assert!(store.health_check().await.is_err());

        store.reset_calls();
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_flaky_cache_injects_failures() {
        let cache = FlakyCache::new(ManualClock::new(fixtures::epoch()));
        let key = CacheKey::all(&fixtures::roles());

        cache
            .set_with_ttl(&key, b"[]".to_vec(), Duration::from_secs(5))
            .await
            .expect("set should succeed");
        assert!(cache.contains(&key));

        cache.fail_reads(true);
        assert!(cache.get(&key).await.is_err());
        cache.fail_all(false);
        assert!(cache.get(&key).await.expect("get").is_some());
    }

    #[test]
    fn test_fixture_documents_are_complete() {
        let port = fixtures::port("SGSIN", "Singapore");
        assert_eq!(
            port.first_missing(&["portCode", "portName", "connectionType"]),
            None
        );
        let user = fixtures::user("Ada", "ada@example.com");
        assert_eq!(user.first_missing(&["name", "email", "password"]), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_fields_never_contain_id(fields in generators::arb_fields()) {
            prop_assert!(!fields.contains_key("id"));
        }

        #[test]
        fn prop_keyed_document_carries_code((code, doc) in generators::arb_keyed_document("portCode")) {
            prop_assert_eq!(doc.get("portCode"), Some(&serde_json::Value::String(code)));
        }
    }
}
