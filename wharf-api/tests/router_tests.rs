//! HTTP-level tests for the resource and health routers.

mod support;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};
use support::{cache_status, get, post_raw, record_id, test_config, TestApp};
use wharf_api::ApiConfig;
use wharf_core::{Filter, RecordId};
use wharf_storage::{CacheKey, DocumentStore};
use wharf_test_utils::fixtures;

fn port_body(code: &str, name: &str) -> Value {
    json!({ "portCode": code, "portName": name, "connectionType": "sea" })
}

// ============================================================================
// PORTS
// ============================================================================

#[tokio::test]
async fn test_post_port_creates_then_updates() {
    let app = TestApp::new();

    let (status, _, body) = app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Port created successfully");
    assert_eq!(body["port"]["portName"], "Rotterdam");
    let id = record_id(&body, "port");

    let (status, _, body) = app.post("/api/port", port_body("NLRTM", "Port of Rotterdam")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Port updated successfully");
    assert_eq!(record_id(&body, "port"), id);

    assert_eq!(app.store.inner().count(&fixtures::ports()).expect("count"), 1);

    let (status, headers, body) = app.get(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status(&headers), Some("hit"));
    assert_eq!(body["port"]["portName"], "Port of Rotterdam");
}

#[tokio::test]
async fn test_write_through_uses_entry_ttl() {
    let app = TestApp::new();
    let (_, _, body) = app.post("/api/role", json!({ "roleName": "admin" })).await;
    let id = RecordId::new(record_id(&body, "role"));
    let key = CacheKey::record(&fixtures::roles(), &id);

    assert_eq!(
        app.cache.ttl_remaining(&key).expect("ttl lookup"),
        Some(Duration::from_secs(3600))
    );

    app.clock.advance(Duration::from_secs(3600));
    assert_eq!(app.cache.ttl_remaining(&key).expect("ttl lookup"), None);
}

#[tokio::test]
async fn test_get_by_id_miss_then_hit() {
    let app = TestApp::new();
    let id = app
        .store
        .inner()
        .insert_one(&fixtures::ports(), fixtures::port("SGSIN", "Singapore"))
        .await
        .expect("seed insert");

    let (status, headers, body) = app.get(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status(&headers), Some("miss"));
    assert_eq!(body["port"]["portCode"], "SGSIN");
    assert_eq!(app.store.calls().find_one, 1);

    let (status, headers, _) = app.get(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status(&headers), Some("hit"));
    assert_eq!(app.store.calls().find_one, 1);
}

#[tokio::test]
async fn test_unknown_id_is_404_and_not_cached() {
    let app = TestApp::new();

    for _ in 0..2 {
        let (status, _, body) = app.get("/api/port?id=missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "ENTITY_NOT_FOUND");
    }
    assert_eq!(app.store.calls().find_one, 2);
}

#[tokio::test]
async fn test_get_all_lists_records() {
    let app = TestApp::new();
    app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    app.post("/api/port", port_body("DEHAM", "Hamburg")).await;

    let (status, _, body) = app.get("/api/port").await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["ports"]
        .as_array()
        .expect("ports array")
        .iter()
        .filter_map(|p| p["portCode"].as_str())
        .collect();
    assert_eq!(codes, vec!["NLRTM", "DEHAM"]);
}

#[tokio::test]
async fn test_empty_id_lists_everything() {
    let app = TestApp::new();
    let (status, _, body) = app.get("/api/port?id=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ports"], json!([]));
}

#[tokio::test]
async fn test_list_is_stale_until_ttl() {
    let app = TestApp::new();
    app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;

    let (_, headers, body) = app.get("/api/port").await;
    assert_eq!(cache_status(&headers), Some("miss"));
    assert_eq!(body["ports"].as_array().map(Vec::len), Some(1));

    app.post("/api/port", port_body("DEHAM", "Hamburg")).await;

    let (_, headers, body) = app.get("/api/port").await;
    assert_eq!(cache_status(&headers), Some("hit"));
    assert_eq!(body["ports"].as_array().map(Vec::len), Some(1));

    app.clock.advance(Duration::from_secs(3600));

    let (_, headers, body) = app.get("/api/port").await;
    assert_eq!(cache_status(&headers), Some("miss"));
    assert_eq!(body["ports"].as_array().map(Vec::len), Some(2));
}

// ============================================================================
// VALIDATION
// ============================================================================

#[tokio::test]
async fn test_missing_required_field_is_400() {
    let app = TestApp::new();

    let (status, _, body) = app
        .post("/api/port", json!({ "portCode": "NLRTM", "connectionType": "sea" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert_eq!(body["details"]["field"], "portName");

    let (status, _, body) = app
        .post("/api/port", json!({ "portCode": "", "portName": "X", "connectionType": "sea" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "portCode");

    assert_eq!(app.store.calls().total(), 0);
}

#[tokio::test]
async fn test_malformed_bodies_are_400() {
    let app = TestApp::new();

    let (status, _, body) = app.send(post_raw("/api/port", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, _, _) = app.post("/api/port", json!(["NLRTM"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .post("/api/role", json!({ "id": 7, "roleName": "admin" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_id_clash_is_conflict() {
    let app = TestApp::new();
    let (_, _, body) = app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    let taken = record_id(&body, "port");

    let mut clash = port_body("DEHAM", "Hamburg");
    clash["id"] = Value::String(taken.clone());
    let (status, _, body) = app.post("/api/port", clash).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ID");

    let (_, _, body) = app.get(&format!("/api/port?id={taken}")).await;
    assert_eq!(body["port"]["portCode"], "NLRTM");
}

// ============================================================================
// USERS
// ============================================================================

#[tokio::test]
async fn test_user_password_is_hashed_and_redacted() {
    let app = TestApp::new();
    let user = json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter2" });

    let (status, _, body) = app.post("/api/user", user.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created successfully");
    assert!(body["user"].get("password").is_none());
    let id = record_id(&body, "user");

    let stored = app
        .store
        .inner()
        .find_one(&fixtures::users(), &Filter::id(id.as_str()))
        .await
        .expect("store read")
        .expect("user stored");
    let hash = stored
        .get("password")
        .and_then(Value::as_str)
        .expect("hash stored");
    assert_ne!(hash, "hunter2");
    assert!(bcrypt::verify("hunter2", hash).expect("valid hash"));

    let (status, _, body) = app.get(&format!("/api/user?userId={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_users_are_always_inserted() {
    let app = TestApp::new();
    let user = json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter2" });

    let (first, _, a) = app.post("/api/user", user.clone()).await;
    let (second, _, b) = app.post("/api/user", user).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CREATED);
    assert_ne!(record_id(&a, "user"), record_id(&b, "user"));

    let (_, _, body) = app.get("/api/user").await;
    let users = body["users"].as_array().expect("users array");
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password").is_none()));
}

#[tokio::test]
async fn test_user_fixed_id_inserts_once() {
    let app = TestApp::new();
    let user = json!({
        "id": "fixed",
        "name": "Ada",
        "email": "ada@example.com",
        "password": "hunter2",
    });

    let (status, _, body) = app.post("/api/user", user.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record_id(&body, "user"), "fixed");

    let (status, _, body) = app.post("/api/user", user).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ID");
}

#[tokio::test]
async fn test_user_fields_keep_submitted_order() {
    let app = TestApp::new();
    let user = json!({
        "password": "hunter2",
        "name": "Ada",
        "email": "ada@example.com",
        "phone": "555-0100",
    });

    let (_, _, body) = app.post("/api/user", user).await;
    let keys: Vec<&str> = body["user"]
        .as_object()
        .expect("user object")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["id", "name", "email", "phone"]);
}

// ============================================================================
// ROLES
// ============================================================================

#[tokio::test]
async fn test_role_upsert_by_role_name() {
    let app = TestApp::new();

    let (status, _, body) = app
        .post("/api/role", json!({ "roleName": "admin", "isActive": true }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = record_id(&body, "role");

    let (status, _, body) = app
        .post("/api/role", json!({ "roleName": "admin", "isActive": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role updated successfully");
    assert_eq!(record_id(&body, "role"), id);
    assert_eq!(body["role"]["isActive"], false);
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
async fn test_delete_flow() {
    let app = TestApp::new();
    let (_, _, body) = app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    let id = record_id(&body, "port");

    let (status, _, body) = app.delete(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Port deleted successfully");

    let (status, _, _) = app.get(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.delete(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = app.delete("/api/port").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["field"], "id");
}

// ============================================================================
// FAILURE HANDLING
// ============================================================================

#[tokio::test]
async fn test_cache_failures_never_surface() {
    let app = TestApp::new();
    app.cache.fail_all(true);

    let (status, _, body) = app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = record_id(&body, "port");

    let (status, headers, _) = app.get(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status(&headers), Some("miss"));

    let (status, _, _) = app.delete(&format!("/api/port?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let app = TestApp::new();
    app.store.set_unavailable(true);

    let (status, _, body) = app.get("/api/port").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert!(!body["message"].as_str().unwrap_or_default().contains("simulated"));

    let (status, _, _) = app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// RATE LIMITING
// ============================================================================

#[tokio::test]
async fn test_api_routes_are_rate_limited() {
    let app = TestApp::with_config(ApiConfig {
        rate_limit_enabled: true,
        rate_limit_requests: 2,
        trust_proxy_headers: true,
        ..test_config()
    });

    let from = |uri: &str| {
        let mut request = get(uri);
        request
            .headers_mut()
            .insert("x-forwarded-for", "203.0.113.9".parse().expect("header value"));
        request
    };

    assert_eq!(app.send(from("/api/port")).await.0, StatusCode::OK);
    assert_eq!(app.send(from("/api/role")).await.0, StatusCode::OK);

    let (status, headers, body) = app.send(from("/api/user")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "TOO_MANY_REQUESTS");
    assert!(headers.contains_key("retry-after"));

    let (status, _, _) = app.send(from("/health/ping")).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// CORS
// ============================================================================

#[tokio::test]
async fn test_cors_accepts_wildcard_subdomains() {
    let app = TestApp::with_config(ApiConfig {
        cors_origins: vec!["*.wharf.example".to_string()],
        ..test_config()
    });

    let from = |origin: &'static str| {
        let mut request = get("/health/ping");
        request
            .headers_mut()
            .insert("origin", origin.parse().expect("header value"));
        request
    };

    let (status, headers, _) = app.send(from("https://admin.wharf.example")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://admin.wharf.example")
    );

    let (_, headers, _) = app.send(from("https://evil.example")).await;
    assert!(!headers.contains_key("access-control-allow-origin"));
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let (status, _, body) = app.get("/health/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("pong".to_string()));

    let (status, _, body) = app.get("/health/live").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["database"]["status"], "healthy");
    assert!(body["details"]["cache"]["backend"].is_object());
}

#[tokio::test]
async fn test_readiness_reports_store_outage_and_degradations() {
    let app = TestApp::new();

    app.cache.fail_writes(true);
    app.post("/api/port", port_body("NLRTM", "Rotterdam")).await;

    let (status, _, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["cache"]["counters"]["degraded_writes"], 1);

    app.store.set_unavailable(true);
    let (status, _, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["details"]["database"]["status"], "unhealthy");
}
