//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (loopback only)
//!     → listener.rs (accept loop, admission after accept)
//!     → slots.rs (claim lowest free slot, or drop the connection)
//!     → session.rs (one bounded read, one fixed response)
//!     → slot released on every exit path
//!
//! Session outcomes:
//!     Responded | TimedOut | PeerClosed | ReadFailed | WriteFailed | Cancelled
//! ```
//!
//! # Design Decisions
//! - The slot table is the only state shared between listener and sessions
//! - Accept errors back off and retry; only shutdown ends the accept loop
//! - Sessions observe a cancellation token; shutdown never kills a task mid-write
//!   unless it overruns the drain timeout

pub mod connection;
pub mod listener;
pub mod session;
pub mod slots;

pub use connection::{Session, SessionId};
pub use listener::{Acceptor, AdmissionListener, ListenerReport};
pub use session::{SessionOutcome, SessionWorker, MAX_REQUEST_BYTES};
pub use slots::{ClaimError, SlotGuard, SlotTable};
