//! Control API service: start and stop the admission layer.
//!
//! # Responsibilities
//! - Refuse a second concurrent run
//! - Bind the loopback listener, allocate the slot table, launch the accept loop
//! - Release everything acquired so far if any start step fails
//! - Stop: cancel the accept loop and force-drain all sessions

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::ApiConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::listener::{drain_sessions, AdmissionListener, ListenerReport};
use crate::net::slots::SlotTable;

/// Service-level failures. Each one leaves the service stopped.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API already running")]
    AlreadyRunning,

    #[error("invalid API configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to bind API listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to allocate slot table for {capacity} connections")]
    Allocation { capacity: usize },

    #[error("failed to launch API listener: {0}")]
    Spawn(String),
}

/// Result of a Stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The service was running and has been stopped.
    Stopped(ListenerReport),
    /// Nothing was running; nothing was done.
    NotRunning,
}

struct RunningService {
    local_addr: SocketAddr,
    slots: Arc<SlotTable>,
    shutdown: Shutdown,
    listener: JoinHandle<ListenerReport>,
    drain_timeout: Duration,
}

/// The node's local control API.
///
/// At most one accept loop runs at a time. The state lock is held across
/// start and stop, so they never interleave.
pub struct ApiService {
    state: Mutex<Option<RunningService>>,
}

impl ApiService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Start listening on `127.0.0.1:<config.port>`.
    ///
    /// Returns the bound address once the accept loop is confirmed running.
    pub async fn start(&self, config: &ApiConfig) -> Result<SocketAddr, ServiceError> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            tracing::warn!("API already running");
            return Err(ServiceError::AlreadyRunning);
        }

        if config.max_connections == 0 {
            return Err(ServiceError::InvalidConfig("max_connections must be at least 1".into()));
        }
        if config.timeout_ms == 0 {
            return Err(ServiceError::InvalidConfig("timeout_ms must be at least 1".into()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ServiceError::Spawn(e.to_string()))?;

        // The API is only reachable from the local host.
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.port));
        let socket = TcpListener::bind(addr).await.map_err(|source| {
            tracing::error!(port = config.port, error = %source, "Failed to init API");
            ServiceError::Bind { addr, source }
        })?;
        let local_addr = socket.local_addr().map_err(|source| ServiceError::Bind { addr, source })?;

        // From here on an early return drops `socket`, which closes it.
        let slots = SlotTable::with_capacity(config.max_connections).map_err(|e| {
            tracing::error!(
                capacity = config.max_connections,
                error = %e,
                "Error allocating slot table"
            );
            ServiceError::Allocation {
                capacity: config.max_connections,
            }
        })?;
        let slots = Arc::new(slots);

        let shutdown = Shutdown::new();
        let listener = AdmissionListener::new(
            socket,
            Arc::clone(&slots),
            config.session_timeout(),
            config.drain_timeout(),
            shutdown.token(),
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        let task = runtime.spawn(listener.run(ready_tx));
        if ready_rx.await.is_err() {
            // The task ended without signalling; its future (and the socket) is gone.
            task.abort();
            tracing::error!("Error creating task for API");
            return Err(ServiceError::Spawn("accept loop exited before becoming ready".into()));
        }

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            timeout_ms = config.timeout_ms,
            "API listening"
        );

        *state = Some(RunningService {
            local_addr,
            slots,
            shutdown,
            listener: task,
            drain_timeout: config.drain_timeout(),
        });
        Ok(local_addr)
    }

    /// Stop the accept loop and force-close every in-flight session.
    pub async fn stop(&self) -> StopOutcome {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            tracing::debug!("Stop requested but API is not running");
            return StopOutcome::NotRunning;
        };

        running.shutdown.trigger();
        let report = match running.listener.await {
            Ok(report) => report,
            Err(e) => {
                // The loop died without draining; do it here so no session leaks.
                tracing::error!(error = %e, "API listener task failed");
                let handles = running.slots.force_drain();
                let drained = drain_sessions(handles, running.drain_timeout).await;
                ListenerReport {
                    drained,
                    ..ListenerReport::default()
                }
            }
        };

        tracing::info!(
            address = %running.local_addr,
            drained = report.drained,
            "API stopped"
        );
        StopOutcome::Stopped(report)
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Occupied slots right now; zero when stopped.
    pub async fn active_sessions(&self) -> usize {
        match self.state.lock().await.as_ref() {
            Some(running) => running.slots.active_count(),
            None => 0,
        }
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().await.as_ref().map(|r| r.local_addr)
    }
}

impl Default for ApiService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ApiService {
    fn drop(&mut self) {
        // Without a Stop the accept loop would outlive its owner.
        if let Some(running) = self.state.get_mut().take() {
            running.shutdown.trigger();
        }
    }
}
