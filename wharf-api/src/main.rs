//! Wharf API Server Entry Point
//!
//! Bootstraps configuration, the PostgreSQL document store and the cache
//! backend, then starts the Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use wharf_api::telemetry::{init_tracer, TelemetryConfig};
use wharf_api::{
    build_cache, create_api_router, ApiConfig, ApiError, ApiResult, ApiStore, AppState,
    CacheSettings, DbConfig, PgDocumentStore,
};
use wharf_storage::{CacheAsideStore, CacheConfig, DocumentStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::from_env())?;

    let api_config = ApiConfig::from_env()?;
    let cache_settings = CacheSettings::from_env()?;
    let db_config = DbConfig::from_env();

    let documents = PgDocumentStore::from_config(&db_config)?;
    documents.ensure_schema().await?;
    tracing::info!(host = %db_config.host, dbname = %db_config.dbname, "Document store ready");

    let cache = build_cache(&cache_settings)?;
    let store: ApiStore = CacheAsideStore::new(
        Arc::new(documents) as Arc<dyn DocumentStore>,
        cache,
        CacheConfig::new().with_ttl(cache_settings.ttl),
    );

    let addr = api_config.bind_addr;
    let app: Router = create_api_router(AppState::new(store, api_config))?;

    tracing::info!(%addr, "Starting Wharf API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
