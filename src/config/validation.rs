//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: CorrelatorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::CorrelatorConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("unknown log level '{0}'")]
    LogLevel(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check value ranges and formats serde cannot express.
pub fn validate_config(config: &CorrelatorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.capture.body_fetch_timeout_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "capture.body_fetch_timeout_ms",
        });
    }
    if config.capture.preview_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "capture.preview_bytes",
        });
    }
    if config.observer.counter_flush_interval_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "observer.counter_flush_interval_ms",
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
