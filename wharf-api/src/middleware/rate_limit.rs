//! Rate Limiting Middleware
//!
//! Each client IP gets its own governor limiter allowing
//! `rate_limit_requests` requests per `rate_limit_window`. Rejected requests
//! receive 429 Too Many Requests with a `Retry-After` header.
//!
//! Clients are keyed by socket address unless `trust_proxy_headers` is set.
//! Limiters idle for a full window are swept, since a fresh limiter is
//! equivalent to a replenished one.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use governor::{clock::DefaultClock, Quota, RateLimiter};

use crate::config::ApiConfig;
use crate::error::ApiError;

/// Type alias for the rate limiter we use.
type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

/// Check for idle limiters once every this many requests.
const SWEEP_INTERVAL: u64 = 1024;

/// A client's limiter and when it was last used.
struct ClientLimiter {
    limiter: DirectRateLimiter,
    /// Milliseconds since [`RateLimitState::started`].
    last_seen_ms: AtomicU64,
}

/// Key for rate limiting.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Keyed by client IP address
    Ip(IpAddr),
}

/// State for rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitState {
    /// API configuration
    config: Arc<ApiConfig>,
    /// Per-key rate limiters
    limiters: Arc<DashMap<RateLimitKey, Arc<ClientLimiter>>>,
    /// Reference point for `last_seen_ms`
    started: Instant,
    /// Requests checked, driving the idle sweep
    checked: Arc<AtomicU64>,
}

impl RateLimitState {
    /// Create new rate limit state from API configuration.
    pub fn new(config: Arc<ApiConfig>) -> Self {
        Self {
            config,
            limiters: Arc::new(DashMap::new()),
            started: Instant::now(),
            checked: Arc::new(AtomicU64::new(0)),
        }
    }

    fn millis_at(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.started).as_millis() as u64
    }

    /// Quota of `rate_limit_requests` per `rate_limit_window`, all of it
    /// available as a burst.
    fn quota(&self) -> Quota {
        let requests = NonZeroU32::new(self.config.rate_limit_requests).unwrap_or(NonZeroU32::MIN);
        let period = self.config.rate_limit_window / requests.get();
        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_minute(requests))
            .allow_burst(requests)
    }

    /// Get or create a rate limiter for the given key and mark it used.
    fn get_or_create_limiter(&self, key: &RateLimitKey) -> Arc<ClientLimiter> {
        let client = self
            .limiters
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(ClientLimiter {
                    limiter: RateLimiter::direct(self.quota()),
                    last_seen_ms: AtomicU64::new(0),
                })
            })
            .clone();
        client
            .last_seen_ms
            .store(self.millis_at(Instant::now()), Ordering::Relaxed);

        if self.checked.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.sweep_idle();
        }
        client
    }

    /// Drop limiters unused for a full window. Returns how many were removed.
    fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    fn sweep_idle_at(&self, now: Instant) -> usize {
        let window_ms = self.config.rate_limit_window.as_millis() as u64;
        let now_ms = self.millis_at(now);
        let before = self.limiters.len();
        self.limiters.retain(|_, client| {
            now_ms.saturating_sub(client.last_seen_ms.load(Ordering::Relaxed)) < window_ms
        });
        let removed = before.saturating_sub(self.limiters.len());
        if removed > 0 {
            tracing::debug!(removed, tracked = self.tracked_clients(), "swept idle rate limiters");
        }
        removed
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiters.len()
    }
}

/// Error type for rate limit middleware.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until another request will be accepted
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
        response.headers_mut().insert(
            HeaderName::from_static("retry-after"),
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );

        response
    }
}

/// Extract client IP from request, considering proxy headers.
///
/// Order: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// socket address.
pub fn extract_client_ip(request: &Request, fallback: IpAddr) -> IpAddr {
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        if let Ok(ip) = real_ip.trim().parse() {
            return ip;
        }
    }

    fallback
}

/// Rate limiting middleware.
///
/// Requests without connection info (for example in-process tests) share
/// the unspecified address as their key, unless proxy headers are trusted
/// and present.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let socket_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let client_ip = if state.config.trust_proxy_headers {
        extract_client_ip(&request, socket_ip)
    } else {
        socket_ip
    };
    let key = RateLimitKey::Ip(client_ip);
    let client = state.get_or_create_limiter(&key);

    match client.limiter.check() {
        Ok(_) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from(state.config.rate_limit_requests),
            );
            Ok(response)
        }
        Err(not_until) => {
            let wait = not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
            let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            tracing::debug!(key = ?key, retry_after, "rate limited");
            Err(RateLimitError {
                retry_after: retry_after.max(1),
            })
        }
    }
}
