//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section is `#[serde(default)]` so a minimal (or empty) file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the node's control API and exchange.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Local control API (admission layer).
    pub api: ApiConfig,

    /// Block exchange calling defaults.
    pub exchange: ExchangeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Control API listener configuration.
///
/// The API always binds to the loopback address; only the port is configurable.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Loopback port to listen on (0 picks an ephemeral port).
    pub port: u16,

    /// Maximum concurrent sessions. Connections beyond this are accepted and dropped.
    pub max_connections: usize,

    /// Per-connection read deadline in milliseconds.
    pub timeout_ms: u64,

    /// How long Stop waits for cancelled sessions to close before aborting them.
    pub drain_timeout_ms: u64,
}

impl ApiConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 5001,
            max_connections: 10,
            timeout_ms: 5_000,
            drain_timeout_ms: 1_000,
        }
    }
}

/// Defaults applied by exchange callers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Deadline used by convenience fetches that take no explicit deadline.
    pub fetch_timeout_ms: u64,

    /// Retry policy for re-requesting missing blocks of a batch.
    pub retry: RetryConfig,
}

impl ExchangeConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 30_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of batch attempts (the first request included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
