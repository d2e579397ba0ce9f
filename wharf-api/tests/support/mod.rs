//! Shared setup for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`
use wharf_api::{create_api_router, ApiConfig, ApiStore, AppState};
use wharf_storage::{CacheAsideStore, CacheConfig, DocumentStore, ExpiringCache, ManualClock};
use wharf_test_utils::fixtures::epoch;
use wharf_test_utils::{CountingDocumentStore, FlakyCache};

/// Router wired to instrumented fakes.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingDocumentStore>,
    pub cache: Arc<FlakyCache>,
    pub clock: ManualClock,
}

/// Test configuration: cheapest bcrypt cost, no rate limiting.
pub fn test_config() -> ApiConfig {
    ApiConfig {
        rate_limit_enabled: false,
        password_hash_cost: 4,
        ..ApiConfig::default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let clock = ManualClock::new(epoch());
        let store = Arc::new(CountingDocumentStore::new());
        let cache = Arc::new(FlakyCache::new(clock.clone()));
        let aside: ApiStore = CacheAsideStore::with_clock(
            store.clone() as Arc<dyn DocumentStore>,
            cache.clone() as Arc<dyn ExpiringCache>,
            Arc::new(clock.clone()),
            CacheConfig::default(),
        );
        let router = create_api_router(AppState::new(aside, config))
            .expect("router should build from static resources");

        Self {
            router,
            store,
            cache,
            clock,
        }
    }

    /// Send a request and return status, headers and the JSON body.
    ///
    /// Non-JSON bodies come back as a JSON string.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        self.send(get(uri)).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, HeaderMap, Value) {
        self.send(post_raw(uri, body.to_string())).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub fn post_raw(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .expect("valid request")
}

/// Value of the cache status header.
pub fn cache_status(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-wharf-cache").and_then(|v| v.to_str().ok())
}

/// `id` of the record under `key` in a response body.
pub fn record_id(body: &Value, key: &str) -> String {
    body[key]["id"]
        .as_str()
        .unwrap_or_else(|| panic!("no {key}.id in {body}"))
        .to_string()
}
