//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field rules.
//! All problems are reported at once rather than stopping at the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::NodeConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("api.max_connections must be at least 1")]
    ZeroCapacity,

    #[error("api.timeout_ms must be at least 1")]
    ZeroSessionTimeout,

    #[error("exchange.fetch_timeout_ms must be at least 1")]
    ZeroFetchTimeout,

    #[error("exchange.retry.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("exchange.retry.base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    BackoffInverted { base: u64, max: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.api.max_connections == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }
    if config.api.timeout_ms == 0 {
        errors.push(ValidationError::ZeroSessionTimeout);
    }
    if config.exchange.fetch_timeout_ms == 0 {
        errors.push(ValidationError::ZeroFetchTimeout);
    }

    let retry = &config.exchange.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::BackoffInverted {
            base: retry.base_delay_ms,
            max: retry.max_delay_ms,
        });
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(obs.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
