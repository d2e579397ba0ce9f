//! Generic REST handlers for cache-aside resources.
//!
//! One router per [`ResourceSpec`], mounted at `/api/<singular>`:
//!
//! | Request | Result |
//! |---|---|
//! | `GET ?id=<id>` | `{"<singular>": record}` or 404 |
//! | `GET` | `{"<plural>": [records]}` |
//! | `POST` JSON object | 201 created / 200 updated, `{"message", "<singular>"}` |
//! | `DELETE ?id=<id>` | `{"message"}` or 404 |
//!
//! GET responses carry an `x-wharf-cache` header, `hit` or `miss`.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use wharf_core::{Collection, Document, Record, RecordId};
use wharf_storage::CacheRead;

use crate::error::{ApiError, ApiResult};
use crate::resources::ResourceSpec;
use crate::state::ApiStore;

/// Response header reporting whether a read was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-wharf-cache";

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone)]
pub struct ResourceState {
    store: ApiStore,
    spec: ResourceSpec,
    collection: Collection,
    hash_cost: u32,
}

impl ResourceState {
    pub fn new(store: ApiStore, spec: ResourceSpec, hash_cost: u32) -> ApiResult<Self> {
        Ok(Self {
            store,
            spec,
            collection: spec.collection()?,
            hash_cost,
        })
    }

    /// The `id` query parameter or one of its aliases, if non-blank.
    fn requested_id(&self, params: &HashMap<String, String>) -> Option<RecordId> {
        std::iter::once("id")
            .chain(self.spec.id_aliases.iter().copied())
            .filter_map(|name| params.get(name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(RecordId::from)
    }

    /// Record as returned to clients, without redacted fields.
    fn present(&self, record: Record) -> ApiResult<Value> {
        serde_json::to_value(record.without_fields(self.spec.redacted_fields)).map_err(|e| {
            tracing::error!(collection = %self.collection, "Response serialization failed: {:?}", e);
            ApiError::internal_error("Failed to serialize record")
        })
    }

    /// Replace every hashed field with its bcrypt hash.
    async fn hash_fields(&self, document: &mut Document) -> ApiResult<()> {
        for field in self.spec.hashed_fields {
            let plain = match document.get(field) {
                None => continue,
                Some(Value::String(plain)) => plain.clone(),
                Some(_) => {
                    return Err(ApiError::invalid_input(format!(
                        "Field '{}' must be a string",
                        field
                    )))
                }
            };

            let cost = self.hash_cost;
            let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
                .await
                .map_err(|e| ApiError::internal_error(format!("Hashing task failed: {}", e)))?
                .map_err(|e| {
                    tracing::error!("bcrypt failure: {:?}", e);
                    ApiError::internal_error("Failed to hash field")
                })?;
            document.set(*field, Value::String(hashed));
        }
        Ok(())
    }
}

fn body_with(entries: impl IntoIterator<Item = (&'static str, Value)>) -> Json<Value> {
    let body: Map<String, Value> = entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    Json(Value::Object(body))
}

fn with_cache_status(hit: bool, body: Json<Value>) -> Response {
    let status = if hit { "hit" } else { "miss" };
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(status),
    );
    response
}

/// Trace where a read came from. Returns whether it was a cache hit.
fn log_read<T>(state: &ResourceState, read: &CacheRead<T>) -> bool {
    tracing::debug!(
        collection = %state.collection,
        source = ?read.source(),
        read_at = %read.read_at(),
        "read served"
    );
    read.was_cache_hit()
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET - one record by id, or every record.
pub async fn get_resource(
    State(state): State<ResourceState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    match state.requested_id(&params) {
        Some(id) => {
            tracing::debug!(collection = %state.collection, id = %id, "get by id");
            let read = state
                .store
                .get_by_id(&state.collection, &id)
                .await?
                .ok_or_else(|| ApiError::entity_not_found(state.spec.display_name, &id))?;

            let hit = log_read(&state, &read);
            let record = state.present(read.into_value())?;
            Ok(with_cache_status(hit, body_with([(state.spec.singular, record)])))
        }
        None => {
            tracing::debug!(collection = %state.collection, "get all");
            let read = state.store.get_all(&state.collection).await?;

            let hit = log_read(&state, &read);
            let records = read
                .into_value()
                .into_iter()
                .map(|record| state.present(record))
                .collect::<ApiResult<Vec<_>>>()?;
            Ok(with_cache_status(hit, body_with([(state.spec.plural, Value::Array(records))])))
        }
    }
}

/// POST - create, or update the record sharing the natural key.
pub async fn create_resource(
    State(state): State<ResourceState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let value: Value = serde_json::from_slice(&body)?;
    let mut document = Document::from_json(value)?;

    if let Some(field) = document.first_missing(state.spec.required_fields) {
        return Err(ApiError::missing_field(field));
    }

    state.hash_fields(&mut document).await?;

    let outcome = match state.spec.natural_key {
        Some(natural_key) => {
            state
                .store
                .upsert_by_natural_key(&state.collection, natural_key, document)
                .await?
        }
        None => state.store.insert(&state.collection, document).await?,
    };

    let (status, verb) = if outcome.created {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "updated")
    };
    tracing::info!(
        collection = %state.collection,
        id = %outcome.stored.id(),
        created = outcome.created,
        cache_refreshed = outcome.cache_refreshed,
        "record saved"
    );

    let message = format!("{} {} successfully", state.spec.display_name, verb);
    let record = state.present(outcome.stored)?;
    Ok((
        status,
        body_with([
            ("message", Value::String(message)),
            (state.spec.singular, record),
        ]),
    ))
}

/// DELETE - remove one record by id.
pub async fn delete_resource(
    State(state): State<ResourceState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<impl IntoResponse> {
    let id = state
        .requested_id(&params)
        .ok_or_else(|| ApiError::missing_field("id"))?;

    let outcome = state.store.delete_by_id(&state.collection, &id).await?;
    if !outcome.deleted {
        return Err(ApiError::entity_not_found(state.spec.display_name, &id));
    }

    tracing::info!(
        collection = %state.collection,
        id = %id,
        cache_invalidated = outcome.cache_invalidated,
        "record deleted"
    );

    let message = format!("{} deleted successfully", state.spec.display_name);
    Ok((StatusCode::OK, body_with([("message", Value::String(message))])))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the router for one resource at `spec.path()`.
pub fn create_router(store: ApiStore, spec: ResourceSpec, hash_cost: u32) -> ApiResult<Router> {
    let state = ResourceState::new(store, spec, hash_cost)?;

    Ok(Router::new()
        .route(
            &spec.path(),
            get(get_resource).post(create_resource).delete(delete_resource),
        )
        .with_state(state))
}
