//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every field has a default so a missing or partial file is valid.

use serde::{Deserialize, Serialize};

use crate::session::record::DEFAULT_PREVIEW_BYTES;

/// Root configuration for the session correlator.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Body capture settings.
    pub capture: CaptureConfig,

    /// Observer notification settings.
    pub observer: ObserverConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Body capture configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Fetch request bodies the proxy reports as present.
    pub request_bodies: bool,

    /// Fetch response bodies the proxy reports as present.
    pub response_bodies: bool,

    /// Upper bound on a single body fetch in milliseconds.
    pub body_fetch_timeout_ms: u64,

    /// Number of leading body bytes rendered in hex previews.
    pub preview_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            request_bodies: true,
            response_bodies: true,
            body_fetch_timeout_ms: 30_000,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }
}

/// Observer notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObserverConfig {
    /// How often coalesced byte-counter updates are pushed, in milliseconds.
    pub counter_flush_interval_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            counter_flush_interval_ms: 250,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
