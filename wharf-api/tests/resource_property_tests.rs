//! Property-Based Tests for the resource routes
//!
//! Arbitrary port documents are posted through the full router and read
//! back, checking upsert identity and field round-trips over HTTP.

mod support;

use std::fmt::Display;

use axum::http::StatusCode;
use proptest::prelude::*;
use serde_json::Value;
use support::{cache_status, record_id, TestApp};
use wharf_test_utils::fixtures;
use wharf_test_utils::generators;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

fn fail(e: impl Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

fn port_json(code: &str, mut fields: wharf_core::Fields) -> Value {
    fields.insert("portCode".to_string(), Value::from(code));
    fields.insert("portName".to_string(), Value::from("Harbour"));
    fields.insert("connectionType".to_string(), Value::from("sea"));
    Value::Object(fields)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Posting the same port code twice yields one record whose id survives
    /// the update and whose fields are the second body's.
    #[test]
    fn prop_port_post_is_upsert(
        code in generators::arb_code(),
        first in generators::arb_fields(),
        second in generators::arb_fields(),
    ) {
        runtime().block_on(async {
            let app = TestApp::new();

            let (status, _, created) = app.post("/api/port", port_json(&code, first)).await;
            prop_assert_eq!(status, StatusCode::CREATED);

            let body = port_json(&code, second);
            let (status, _, updated) = app.post("/api/port", body.clone()).await;
            prop_assert_eq!(status, StatusCode::OK);
            prop_assert_eq!(record_id(&created, "port"), record_id(&updated, "port"));

            let count = app.store.inner().count(&fixtures::ports()).map_err(fail)?;
            prop_assert_eq!(count, 1);

            let id = record_id(&updated, "port");
            let (status, headers, read) = app.get(&format!("/api/port?id={id}")).await;
            prop_assert_eq!(status, StatusCode::OK);
            prop_assert_eq!(cache_status(&headers), Some("hit"));

            let Value::Object(sent) = body else {
                return Err(fail("body is not an object"));
            };
            let port = read["port"].as_object().ok_or_else(|| fail("no port object"))?;
            prop_assert_eq!(port.len(), sent.len() + 1);
            for (key, value) in &sent {
                prop_assert_eq!(port.get(key), Some(value));
            }
            Ok(())
        })?;
    }

    /// A body missing any one required field is rejected without touching
    /// the store.
    #[test]
    fn prop_missing_required_field_rejected(
        code in generators::arb_code(),
        fields in generators::arb_fields(),
        dropped in 0usize..3,
    ) {
        runtime().block_on(async {
            let app = TestApp::new();
            let required = ["portCode", "portName", "connectionType"];

            let mut body = port_json(&code, fields);
            if let Value::Object(map) = &mut body {
                map.remove(required[dropped]);
            }

            let (status, _, error) = app.post("/api/port", body).await;
            prop_assert_eq!(status, StatusCode::BAD_REQUEST);
            prop_assert_eq!(&error["code"], "MISSING_FIELD");
            prop_assert_eq!(&error["details"]["field"], required[dropped]);
            prop_assert_eq!(app.store.calls().total(), 0);
            Ok(())
        })?;
    }
}
