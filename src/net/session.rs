//! Per-connection session worker.
//!
//! # Responsibilities
//! - Wait for the request within the per-connection deadline
//! - Perform one bounded read and write one fixed response
//! - Observe cancellation at every suspension point
//! - Always close the transport and release the slot, exactly once
//!
//! A session is one read/write pair, not a persistent connection handler.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::http::{classify, response, RequestKind};
use crate::net::connection::Session;
use crate::net::slots::SlotGuard;
use crate::observability::metrics;

/// Largest request read from a single connection.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A response was written for the request.
    Responded(RequestKind),
    /// Nothing arrived before the deadline; no response was written.
    TimedOut,
    /// The peer closed before sending anything.
    PeerClosed,
    /// The read failed.
    ReadFailed,
    /// Writing the response failed or stalled past the deadline.
    WriteFailed,
    /// Shutdown cancelled the session.
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Responded(RequestKind::Fetch) => "not_found",
            SessionOutcome::Responded(RequestKind::Unrecognized) => "bad_request",
            SessionOutcome::TimedOut => "timeout",
            SessionOutcome::PeerClosed => "peer_closed",
            SessionOutcome::ReadFailed => "read_failed",
            SessionOutcome::WriteFailed => "write_failed",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Serves one admitted connection and owns its slot until it finishes.
pub struct SessionWorker<S> {
    stream: S,
    session: Session,
    slot: SlotGuard,
    cancel: CancellationToken,
}

impl<S> SessionWorker<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, session: Session, slot: SlotGuard, cancel: CancellationToken) -> Self {
        Self {
            stream,
            session,
            slot,
            cancel,
        }
    }

    /// Run the read/respond cycle to completion.
    ///
    /// If the future is dropped instead (task aborted), the stream and the
    /// slot guard are dropped with it, so cleanup still happens once.
    pub async fn run(self) -> SessionOutcome {
        let SessionWorker {
            mut stream,
            session,
            slot,
            cancel,
        } = self;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => SessionOutcome::Cancelled,
            outcome = serve(&mut stream, &session) => outcome,
        };

        drop(stream);
        let released = slot.release();

        tracing::info!(
            session_id = %session.id,
            peer = %session.peer.ip(),
            port = session.peer.port(),
            slot = session.slot_number(),
            outcome = outcome.as_str(),
            released,
            "Closing client connection"
        );
        metrics::record_session_closed(outcome.as_str());
        outcome
    }
}

async fn serve<S>(stream: &mut S, session: &Session) -> SessionOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];

    // The readiness wait and the read share one deadline.
    let read = match timeout(session.timeout, stream.read(&mut buf)).await {
        Err(_) => {
            tracing::warn!(
                session_id = %session.id,
                peer = %session.peer,
                timeout_ms = session.timeout.as_millis() as u64,
                "Client connection timeout"
            );
            return SessionOutcome::TimedOut;
        }
        Ok(Err(e)) => {
            tracing::warn!(
                session_id = %session.id,
                peer = %session.peer,
                error = %e,
                "Read from client failed"
            );
            return SessionOutcome::ReadFailed;
        }
        Ok(Ok(0)) => {
            tracing::debug!(
                session_id = %session.id,
                peer = %session.peer,
                "Client closed before sending a request"
            );
            return SessionOutcome::PeerClosed;
        }
        Ok(Ok(n)) => n,
    };

    let kind = classify(&buf[..read]);
    tracing::debug!(
        session_id = %session.id,
        bytes = read,
        kind = kind.as_str(),
        "Request received"
    );

    match write_response(stream, response::for_request(kind), session.timeout).await {
        Ok(()) => SessionOutcome::Responded(kind),
        Err(e) => {
            tracing::warn!(
                session_id = %session.id,
                peer = %session.peer,
                error = %e,
                "Write to client failed"
            );
            SessionOutcome::WriteFailed
        }
    }
}

async fn write_response<S>(
    stream: &mut S,
    response: &[u8],
    deadline: Duration,
) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    timeout(deadline, stream.write_all(response))
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "response write timed out")
        })??;
    // The peer may already be gone; the response is out either way.
    let _ = stream.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{BAD_REQUEST, NOT_FOUND};
    use crate::net::slots::SlotTable;
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    fn admit(
        slots: &Arc<SlotTable>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> (DuplexStream, SessionWorker<DuplexStream>) {
        let peer = "127.0.0.1:50000".parse().unwrap();
        let slot = slots.try_claim(peer, cancel.clone()).unwrap();
        let session = Session {
            id: slot.id(),
            peer,
            index: slot.index(),
            timeout,
        };
        let (client, server) = tokio::io::duplex(8 * 1024);
        (client, SessionWorker::new(server, session, slot, cancel.clone()))
    }

    fn slots() -> Arc<SlotTable> {
        Arc::new(SlotTable::with_capacity(2).unwrap())
    }

    #[tokio::test]
    async fn fetch_gets_not_found() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (mut client, worker) = admit(&slots, Duration::from_secs(5), &cancel);

        client.write_all(b"GET /x HTTP/1.1\r\n\r\n").await.unwrap();
        let outcome = worker.run().await;
        assert_eq!(outcome, SessionOutcome::Responded(RequestKind::Fetch));

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, NOT_FOUND);
        assert_eq!(slots.active_count(), 0);
    }

    #[tokio::test]
    async fn unknown_verb_gets_bad_request() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (mut client, worker) = admit(&slots, Duration::from_secs(5), &cancel);

        client.write_all(b"FOO").await.unwrap();
        assert_eq!(worker.run().await, SessionOutcome::Responded(RequestKind::Unrecognized));

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, BAD_REQUEST);
    }

    #[tokio::test]
    async fn idle_client_times_out_without_response() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (mut client, worker) = admit(&slots, Duration::from_millis(50), &cancel);
        assert_eq!(slots.active_count(), 1);

        assert_eq!(worker.run().await, SessionOutcome::TimedOut);
        assert_eq!(slots.active_count(), 0);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn closed_peer_is_not_answered() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (client, worker) = admit(&slots, Duration::from_secs(5), &cancel);

        drop(client);
        assert_eq!(worker.run().await, SessionOutcome::PeerClosed);
        assert_eq!(slots.active_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_read() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (mut client, worker) = admit(&slots, Duration::from_secs(30), &cancel);

        let task = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancelled session should finish promptly")
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(slots.active_count(), 0);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    #[tokio::test]
    async fn oversized_request_is_read_once() {
        let slots = slots();
        let cancel = CancellationToken::new();
        let (mut client, worker) = admit(&slots, Duration::from_secs(5), &cancel);

        let mut request = b"GET /".to_vec();
        request.extend(std::iter::repeat(b'a').take(MAX_REQUEST_BYTES * 2 - 5));
        client.write_all(&request).await.unwrap();

        assert_eq!(worker.run().await, SessionOutcome::Responded(RequestKind::Fetch));
    }
}
