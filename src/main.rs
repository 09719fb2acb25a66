//! blockport node daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                     NODE                         │
//!   local client  │  ┌──────────┐   ┌────────────┐   ┌───────────┐   │
//!   ──────────────┼─▶│ listener │──▶│ slot table │──▶│  session  │   │
//!   127.0.0.1     │  │ (accept) │   │ (capacity) │   │  worker   │   │
//!                 │  └──────────┘   └────────────┘   └───────────┘   │
//!                 │        ▲                                          │
//!                 │        │ start / stop                             │
//!                 │  ┌──────────┐        ┌──────────────────────────┐ │
//!                 │  │lifecycle │        │ exchange client → engine │ │
//!                 │  └──────────┘        └──────────────────────────┘ │
//!                 └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use blockport::config::{load_config, validate_config, NodeConfig};
use blockport::lifecycle::{signals, ApiService, StopOutcome};
use blockport::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "blockport")]
#[command(about = "Local control API for a content-addressed storage node", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Loopback port for the control API.
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum concurrent API sessions.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Per-connection read timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut NodeConfig) {
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(max) = self.max_connections {
            config.api.max_connections = max;
        }
        if let Some(timeout) = self.timeout_ms {
            config.api.timeout_ms = timeout;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };
    cli.apply(&mut config);
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("invalid configuration: {}", error);
        }
        return Err("configuration rejected".into());
    }

    logging::init(&config.observability.log_level);
    tracing::info!("blockport v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let service = ApiService::new();
    let addr = service.start(&config.api).await?;
    tracing::info!(address = %addr, "Control API ready");

    signals::wait_for_signal().await;

    if let StopOutcome::Stopped(report) = service.stop().await {
        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected,
            drained = report.drained,
            "Shutdown complete"
        );
    }
    Ok(())
}
