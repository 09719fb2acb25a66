//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (service.rs):
//!     Refuse if running → Bind loopback → Allocate slot table
//!         → Spawn accept loop → Wait for readiness → Running
//!
//! Stop (service.rs):
//!     Not running → no-op
//!     Running → Cancel accept loop → Force-drain sessions → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop
//! ```
//!
//! # Design Decisions
//! - Start is all-or-nothing: a failure releases everything acquired so far
//! - Stop is a hard cancellation, bounded by the drain timeout

pub mod service;
pub mod shutdown;
pub mod signals;

pub use service::{ApiService, ServiceError, StopOutcome};
pub use shutdown::Shutdown;
