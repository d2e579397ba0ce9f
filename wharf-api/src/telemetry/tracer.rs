//! Tracing Subscriber Initialization
//!
//! Sets up an `EnvFilter` driven by `RUST_LOG` and a fmt layer that writes
//! either JSON lines or human-readable output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_FILTER: &str = "wharf_api=debug,wharf_storage=debug,tower_http=info,info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Parse `json` or `pretty` (case-insensitive). Anything else is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Output format (`WHARF_LOG_FORMAT`, default json)
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "wharf-api".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TelemetryConfig {
    /// Create a telemetry configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a telemetry configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            service_name: lookup("WHARF_SERVICE_NAME").unwrap_or(defaults.service_name),
            service_version: defaults.service_version,
            format: lookup("WHARF_LOG_FORMAT")
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called once at startup, before any tracing occurs. A second call
/// fails because the global subscriber is already set.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        format = ?config.format,
        "Telemetry initialized"
    );

    Ok(())
}
