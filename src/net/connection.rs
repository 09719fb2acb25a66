//! Session identity and descriptor.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing and slot ownership
//! - Describe an admitted connection (peer, slot index, read deadline)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Global atomic counter for session IDs.
/// Relaxed ordering is enough: only uniqueness is needed.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an admitted session.
///
/// A slot is owned by `(index, SessionId)`, so a stale release for a slot that
/// has since been drained never touches another session's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Everything a worker needs to know about the connection it serves.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub index: usize,
    pub timeout: Duration,
}

impl Session {
    /// 1-based slot number as shown in logs.
    pub fn slot_number(&self) -> usize {
        self.index + 1
    }
}
