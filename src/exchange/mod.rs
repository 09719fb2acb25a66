//! Block exchange subsystem.
//!
//! # Data Flow
//! ```text
//! Upper layer (deadline, ids)
//!     → client.rs (closed / deadline checks, verification)
//!     → contract.rs (Exchange trait)
//!     → engine (memory.rs here, a network engine in production)
//!
//! Missing blocks:
//!     → retry.rs (backoff, re-request what is missing)
//! ```

pub mod client;
pub mod contract;
pub mod memory;
pub mod retry;
pub mod types;

pub use client::ExchangeClient;
pub use contract::Exchange;
pub use memory::{MemoryExchange, MemoryPeer, MAX_PENDING_ANNOUNCEMENTS};
pub use retry::fetch_with_retry;
pub use types::{Block, BlockBatch, Cid, ExchangeError, ExchangeResult};
