//! Admission listener: the accept loop of the control API.
//!
//! # Responsibilities
//! - Accept incoming TCP connections on the loopback listener
//! - Admit each connection into a slot, or drop it when the table is full
//! - Spawn one session worker per admitted connection
//! - On exit, force-drain every remaining session
//!
//! # Design Decisions
//! - Admission happens after accept. Excess connections are accepted and
//!   closed immediately; the peer sees a closed connection with no response.
//! - The accept is raced against the shutdown token, so Stop never waits on
//!   a blocked accept.
//! - Accept errors never end the loop. Per-connection errors are skipped;
//!   anything else (descriptor or buffer exhaustion) backs off and retries,
//!   since it clears once resources are freed. Only shutdown ends the loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::net::connection::Session;
use crate::net::session::SessionWorker;
use crate::net::slots::{ClaimError, SessionHandle, SlotTable};
use crate::observability::metrics;
use crate::resilience::backoff_delay;

/// Pause schedule after a failed accept. `max_attempts` is unused: the loop
/// retries until shutdown.
const ACCEPT_BACKOFF: RetryConfig = RetryConfig {
    max_attempts: u32::MAX,
    base_delay_ms: 10,
    max_delay_ms: 1_000,
};

/// Source of inbound connections for the accept loop.
#[async_trait]
pub trait Acceptor: Send + Sync + 'static {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Summary of one listener run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerReport {
    /// Connections admitted into a slot.
    pub accepted: u64,
    /// Connections dropped because no slot was free.
    pub rejected: u64,
    /// Sessions still running when the loop ended, cancelled by the drain.
    pub drained: usize,
}

/// Accept loop bound to one listener socket and one slot table.
pub struct AdmissionListener<L = TcpListener> {
    listener: L,
    slots: Arc<SlotTable>,
    session_timeout: Duration,
    drain_timeout: Duration,
    shutdown: CancellationToken,
}

impl<L: Acceptor> AdmissionListener<L> {
    pub fn new(
        listener: L,
        slots: Arc<SlotTable>,
        session_timeout: Duration,
        drain_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listener,
            slots,
            session_timeout,
            drain_timeout,
            shutdown,
        }
    }

    /// Run until shutdown is requested.
    ///
    /// `ready` is signalled once the loop is running. The listener socket is
    /// closed when this returns.
    pub async fn run(self, ready: oneshot::Sender<()>) -> ListenerReport {
        let mut report = ListenerReport::default();
        let mut failures = 0u32;
        let _ = ready.send(());

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Accept loop cancelled");
                    break;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    if self.admit(stream, peer) {
                        report.accepted += 1;
                    } else {
                        report.rejected += 1;
                    }
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::warn!(error = %e, "Connection failed during accept");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = backoff_delay(failures, &ACCEPT_BACKOFF);
                    tracing::error!(
                        error = %e,
                        failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "Accept failed, backing off"
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        let Self {
            listener,
            slots,
            drain_timeout,
            ..
        } = self;
        drop(listener);

        report.drained = drain_sessions(slots.force_drain(), drain_timeout).await;
        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected,
            drained = report.drained,
            "Listener stopped"
        );
        report
    }

    /// Claim a slot and spawn a worker. Returns false if the connection was dropped.
    fn admit(&self, stream: TcpStream, peer: SocketAddr) -> bool {
        // Not a child of the shutdown token: only the drain cancels sessions,
        // so every session still running at shutdown is accounted for there.
        let cancel = CancellationToken::new();
        let slot = match self.slots.try_claim(peer, cancel.clone()) {
            Ok(slot) => slot,
            Err(ClaimError::Full { capacity }) => {
                tracing::warn!(peer = %peer, capacity, "Limit of connections reached");
                metrics::record_session_rejected();
                drop(stream);
                return false;
            }
            Err(ClaimError::Drained) => {
                tracing::debug!(peer = %peer, "Connection arrived during shutdown");
                drop(stream);
                return false;
            }
        };

        let session = Session {
            id: slot.id(),
            peer,
            index: slot.index(),
            timeout: self.session_timeout,
        };
        tracing::info!(
            session_id = %session.id,
            peer = %peer.ip(),
            port = peer.port(),
            active = self.slots.active_count(),
            capacity = self.slots.capacity(),
            slot = session.slot_number(),
            "Accepted connection"
        );
        metrics::record_session_accepted();

        // The worker owns the stream and the slot guard. If the task never
        // runs, dropping its future closes the stream and frees the slot.
        let worker = SessionWorker::new(stream, session, slot, cancel);
        let task = tokio::spawn(async move {
            worker.run().await;
        });

        // A worker that already finished has released its slot; nothing to attach to.
        if self.slots.attach_task(session.index, session.id, task).is_err() {
            tracing::trace!(session_id = %session.id, "Session finished before registration");
        }
        true
    }
}

/// Errors that concern only the connection being accepted.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Cancel every drained session and wait up to `grace` for each to close.
///
/// Sessions still running after the grace period are aborted; aborting drops
/// the worker future, which closes its stream.
pub async fn drain_sessions(handles: Vec<SessionHandle>, grace: Duration) -> usize {
    let count = handles.len();
    if count == 0 {
        return 0;
    }

    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(count);
    for mut handle in handles {
        tracing::debug!(
            session_id = %handle.id,
            peer = %handle.peer,
            slot = handle.index + 1,
            "Cancelling session"
        );
        handle.cancel();
        tasks.extend(handle.take_task());
    }

    let deadline = tokio::time::Instant::now() + grace;
    for mut task in tasks {
        if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
            tracing::warn!("Session did not stop within drain timeout, aborting");
            task.abort();
            let _ = task.await;
        }
    }

    tracing::info!(sessions = count, "Drained sessions");
    count
}
