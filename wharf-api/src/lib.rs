//! Wharf API - REST Layer for the Port, User and Role Registry
//!
//! This crate exposes the cache-aside store from wharf-storage over HTTP
//! (Axum). Records live in PostgreSQL as JSONB documents and are cached in
//! LMDB or in process memory with a fixed time-to-live.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod resources;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, CacheBackendKind, CacheSettings};
pub use db::{DbConfig, PgDocumentStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{rate_limit_middleware, RateLimitState};
pub use resources::ResourceSpec;
pub use routes::create_api_router;
pub use state::{build_cache, ApiStore, AppState};
