//! API Configuration Module
//!
//! This module provides configuration for the listener, CORS, rate limiting,
//! password hashing and the cache layer. Configuration is loaded from
//! environment variables with sensible defaults for development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use wharf_core::ConfigError;

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the listener, CORS, rate limiting and hashing.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Listener
    // ========================================================================
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://wharf.example,https://admin.wharf.example"
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Rate Limiting Configuration
    // ========================================================================
    /// Whether rate limiting is enabled.
    pub rate_limit_enabled: bool,

    /// Requests allowed per client IP in one window.
    pub rate_limit_requests: u32,

    /// Window size for rate limiting.
    pub rate_limit_window: Duration,

    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the socket
    /// address. Only enable behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,

    // ========================================================================
    // Password Hashing
    // ========================================================================
    /// bcrypt cost factor for hashed fields.
    pub password_hash_cost: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),

            // CORS defaults: permissive for development
            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400, // 24 hours

            // Rate limiting defaults: 50 requests per minute per IP
            rate_limit_enabled: true,
            rate_limit_requests: 50,
            rate_limit_window: Duration::from_secs(60),
            trust_proxy_headers: false,

            password_hash_cost: 10,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `WHARF_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `WHARF_API_PORT`: Listen port (default: 3000)
    /// - `WHARF_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `WHARF_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `WHARF_RATE_LIMIT_ENABLED`: "true" or "false" (default: true)
    /// - `WHARF_RATE_LIMIT_REQUESTS`: Requests per window per IP (default: 50)
    /// - `WHARF_RATE_LIMIT_WINDOW_SECS`: Window length (default: 60)
    /// - `WHARF_TRUST_PROXY_HEADERS`: "true" keys clients by proxy headers (default: false)
    /// - `WHARF_PASSWORD_HASH_COST`: bcrypt cost, 4 to 31 (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an arbitrary variable source.
    ///
    /// Invalid numbers fall back to their defaults. An invalid bind host or
    /// port is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = resolve_bind_addr(&lookup)?;

        let cors_origins = lookup("WHARF_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs =
            parse_or(&lookup, "WHARF_CORS_MAX_AGE_SECS", defaults.cors_max_age_secs);

        let rate_limit_enabled = lookup("WHARF_RATE_LIMIT_ENABLED")
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let rate_limit_requests = match parse_or(
            &lookup,
            "WHARF_RATE_LIMIT_REQUESTS",
            defaults.rate_limit_requests,
        ) {
            0 => defaults.rate_limit_requests,
            n => n,
        };

        let rate_limit_window = match parse_or(&lookup, "WHARF_RATE_LIMIT_WINDOW_SECS", 60u64) {
            0 => defaults.rate_limit_window,
            secs => Duration::from_secs(secs),
        };

        let trust_proxy_headers = lookup("WHARF_TRUST_PROXY_HEADERS")
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let password_hash_cost = match parse_or(
            &lookup,
            "WHARF_PASSWORD_HASH_COST",
            defaults.password_hash_cost,
        ) {
            cost @ 4..=31 => cost,
            _ => defaults.password_hash_cost,
        };

        Ok(Self {
            bind_addr,
            cors_origins,
            cors_max_age_secs,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            trust_proxy_headers,
            password_hash_cost,
        })
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            // Dev mode: allow all
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.wharf.example
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}

fn resolve_bind_addr(lookup: &impl Fn(&str) -> Option<String>) -> Result<SocketAddr, ConfigError> {
    let host = lookup("WHARF_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
    let port_str = lookup("PORT")
        .or_else(|| lookup("WHARF_API_PORT"))
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidValue {
            field: "WHARF_API_PORT".to_string(),
            value: port_str.clone(),
            reason: "must be a port number".to_string(),
        })?;

    let addr = format!("{}:{}", host.trim(), port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidValue {
            field: "WHARF_API_BIND".to_string(),
            value: host,
            reason: e.to_string(),
        })
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Expiring cache implementation selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Memory-mapped LMDB environment on local disk.
    Lmdb,
    /// Process-local map, lost on restart.
    Memory,
}

/// Cache layer configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Lifetime of every cache entry.
    pub ttl: Duration,
    /// Which backend to construct.
    pub backend: CacheBackendKind,
    /// Directory of the LMDB environment.
    pub path: PathBuf,
    /// LMDB map size in megabytes.
    pub max_size_mb: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            backend: CacheBackendKind::Lmdb,
            path: PathBuf::from("./data/wharf-cache"),
            max_size_mb: 256,
        }
    }
}

impl CacheSettings {
    /// Create cache settings from environment variables.
    ///
    /// Environment variables:
    /// - `WHARF_CACHE_TTL_SECS`: Entry lifetime (default: 3600)
    /// - `WHARF_CACHE_BACKEND`: "lmdb" or "memory" (default: lmdb)
    /// - `WHARF_CACHE_PATH`: LMDB directory (default: ./data/wharf-cache)
    /// - `WHARF_CACHE_MAX_SIZE_MB`: LMDB map size (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheSettings::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ttl = match parse_or(&lookup, "WHARF_CACHE_TTL_SECS", 3600u64) {
            0 => defaults.ttl,
            secs => Duration::from_secs(secs),
        };

        let backend = match lookup("WHARF_CACHE_BACKEND") {
            None => defaults.backend,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "lmdb" => CacheBackendKind::Lmdb,
                "memory" => CacheBackendKind::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "WHARF_CACHE_BACKEND".to_string(),
                        value,
                        reason: "expected 'lmdb' or 'memory'".to_string(),
                    })
                }
            },
        };

        let path = lookup("WHARF_CACHE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.path);

        let max_size_mb = match parse_or(&lookup, "WHARF_CACHE_MAX_SIZE_MB", defaults.max_size_mb) {
            0 => defaults.max_size_mb,
            mb => mb,
        };

        Ok(Self {
            ttl,
            backend,
            path,
            max_size_mb,
        })
    }
}
