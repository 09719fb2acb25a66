//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Batch fetch with missing ids:
//!     → backoff.rs (delay before the next attempt)
//!     → exchange::retry re-requests only what is still missing
//! ```
//!
//! # Design Decisions
//! - Every retry stays inside the caller's deadline
//! - Jitter keeps concurrent callers from retrying in lockstep

pub mod backoff;

pub use backoff::backoff_delay;
