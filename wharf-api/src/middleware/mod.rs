//! Middleware modules for Wharf API
//!
//! - `rate_limit`: Per-client-IP rate limiting for `/api/*`
//!
//! # Middleware Order
//!
//! ```ignore
//! Router::new()
//!     .nest("/api", api_routes.layer(from_fn_with_state(rate_limit_state, rate_limit_middleware)))
//!     .nest("/health", health_routes)
//!     .layer(TraceLayer::new_for_http())
//!     // Outermost
//!     .layer(cors)
//! ```

mod rate_limit;

pub use rate_limit::{
    extract_client_ip, rate_limit_middleware, RateLimitError, RateLimitKey, RateLimitState,
};
