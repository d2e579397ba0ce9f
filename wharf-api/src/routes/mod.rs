//! REST API Routes Module
//!
//! Includes:
//! - Resource routes for ports, users and roles under /api/*
//! - Health check endpoints (Kubernetes-compatible)
//! - CORS support for browser-based clients

pub mod health;
pub mod resource;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::middleware::{rate_limit_middleware, RateLimitState};
use crate::resources;
use crate::state::AppState;

fn build_cors_layer(config: Arc<ApiConfig>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
            HeaderName::from_static(resource::CACHE_STATUS_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        cors.allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| config.is_origin_allowed(origin))
                .unwrap_or(false)
        }))
    }
}

/// Create the complete API router.
///
/// - Resource routes at /api/port, /api/user, /api/role (rate limited)
/// - Health checks at /health/*
pub fn create_api_router(state: AppState) -> ApiResult<Router> {
    let config = state.config.clone();

    let mut api_routes = Router::new();
    for spec in resources::ALL {
        api_routes = api_routes.merge(resource::create_router(
            state.store.clone(),
            spec,
            config.password_hash_cost,
        )?);
    }

    let rate_limit_state = RateLimitState::new(config.clone());
    let api_routes = api_routes.layer(from_fn_with_state(rate_limit_state, rate_limit_middleware));

    let router = Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::create_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config));

    Ok(router)
}
