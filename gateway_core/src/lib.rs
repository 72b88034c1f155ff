//! Shared plumbing for the inference gateway workspace: configuration,
//! the shared error type, the metrics registry, structured logging setup,
//! and the access log writer.
//!
//! Nothing in this crate opens a socket or spawns the backend; it is pure
//! state and utility, imported by `gateway_auth`, `gateway_proxy`, and
//! `gateway_supervisor`.

pub mod access_log;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{ Config, CorsOrigins, LogFormat };
pub use error::{ GatewayError, Result };
pub use metrics::{ MetricsRegistry, MetricsSnapshot };
