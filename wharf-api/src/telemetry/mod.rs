//! Wharf Telemetry - Logging Infrastructure
//!
//! Installs the tracing subscriber for the API process. HTTP request spans
//! come from tower-http's `TraceLayer`, attached in the router.

pub mod tracer;

pub use tracer::{init_tracer, LogFormat, TelemetryConfig};
