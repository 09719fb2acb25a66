//! Fixed-capacity connection slot table.
//!
//! # Responsibilities
//! - Single source of truth for how many sessions are active
//! - Hand out the lowest free slot index to each admitted connection
//! - Release slots exactly once, when the owning session ends
//! - Surrender every occupied slot on forced drain
//!
//! # Design Decisions
//! - One mutex guards the slot vector and the active counter together, so the
//!   capacity check, the free-index search and the occupy step form a single
//!   critical section. Releases take the same lock.
//! - Claims return an RAII [`SlotGuard`]. Dropping it releases the slot.
//! - A slot is owned by `(index, SessionId)`. Releasing a slot that was already
//!   drained is a no-op and can never clear another session's entry.

use std::collections::TryReserveError;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::net::connection::SessionId;
use crate::observability::metrics;

/// Why a slot could not be claimed. Both cases are expected and non-fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("all {capacity} connection slots are occupied")]
    Full { capacity: usize },

    #[error("slot table has been drained")]
    Drained,
}

/// Occupant of a slot: enough to identify and cancel a running session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub index: usize,
    pub peer: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Request cooperative cancellation of the session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Take the worker's join handle, if one was attached.
    pub fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }
}

#[derive(Debug)]
struct SlotState {
    slots: Vec<Option<SessionHandle>>,
    active: usize,
    drained: bool,
}

impl SlotState {
    fn check_invariant(&self) {
        debug_assert_eq!(
            self.active,
            self.slots.iter().filter(|s| s.is_some()).count(),
            "active count out of sync with occupied slots"
        );
    }
}

/// Registry of in-flight sessions with a hard capacity.
#[derive(Debug)]
pub struct SlotTable {
    state: Mutex<SlotState>,
    capacity: usize,
}

impl SlotTable {
    /// Allocate a table with `capacity` empty slots.
    ///
    /// Fails instead of aborting when the slot vector cannot be allocated.
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity)?;
        slots.resize_with(capacity, || None);

        Ok(Self {
            state: Mutex::new(SlotState {
                slots,
                active: 0,
                drained: false,
            }),
            capacity,
        })
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Every mutation is a single step under the lock, so the state is
        // consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the lowest free slot for a connection from `peer`.
    pub fn try_claim(
        self: &Arc<Self>,
        peer: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<SlotGuard, ClaimError> {
        let mut state = self.lock();
        if state.drained {
            return Err(ClaimError::Drained);
        }
        if state.active >= self.capacity {
            return Err(ClaimError::Full {
                capacity: self.capacity,
            });
        }

        let index = state
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ClaimError::Full {
                capacity: self.capacity,
            })?;

        let id = SessionId::new();
        state.slots[index] = Some(SessionHandle {
            id,
            index,
            peer,
            cancel,
            task: None,
        });
        state.active += 1;
        state.check_invariant();
        metrics::record_active_sessions(state.active);

        Ok(SlotGuard {
            table: Some(Arc::clone(self)),
            index,
            id,
        })
    }

    /// Record the worker task serving a claimed slot so a drain can await it.
    ///
    /// Returns the handle back if the slot no longer belongs to `id`.
    pub fn attach_task(
        &self,
        index: usize,
        id: SessionId,
        task: JoinHandle<()>,
    ) -> Result<(), JoinHandle<()>> {
        let mut state = self.lock();
        match state.slots.get_mut(index) {
            Some(Some(handle)) if handle.id == id => {
                handle.task = Some(task);
                Ok(())
            }
            _ => Err(task),
        }
    }

    /// Clear slot `index` if it is still owned by `id`.
    fn release(&self, index: usize, id: SessionId) -> bool {
        let mut state = self.lock();
        let owned = matches!(state.slots.get(index), Some(Some(handle)) if handle.id == id);
        if !owned {
            return false;
        }

        state.slots[index] = None;
        state.active -= 1;
        state.check_invariant();
        metrics::record_active_sessions(state.active);
        true
    }

    /// Remove and return every occupied slot, then refuse further claims.
    ///
    /// Used only during shutdown. Callers must cancel the returned sessions.
    pub fn force_drain(&self) -> Vec<SessionHandle> {
        let mut state = self.lock();
        state.drained = true;
        let handles: Vec<SessionHandle> = state.slots.iter_mut().filter_map(Option::take).collect();
        state.active = 0;
        state.check_invariant();
        metrics::record_active_sessions(0);
        handles
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.lock().active
    }

    /// Configured maximum number of sessions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Indices of all occupied slots, ascending.
    pub fn occupied(&self) -> Vec<usize> {
        self.lock()
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|_| i))
            .collect()
    }
}

/// Ownership of one slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct SlotGuard {
    table: Option<Arc<SlotTable>>,
    index: usize,
    id: SessionId,
}

impl SlotGuard {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Release the slot now.
    ///
    /// Returns false if the slot had already been taken by a forced drain.
    pub fn release(mut self) -> bool {
        match self.table.take() {
            Some(table) => table.release(self.index, self.id),
            None => false,
        }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Some(table) = self.table.take() {
            table.release(self.index, self.id);
        }
    }
}
