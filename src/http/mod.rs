//! Minimal request/response handling for the control API.
//!
//! # Data Flow
//! ```text
//! bytes from one bounded read
//!     → request.rs (classify by leading token)
//!     → response.rs (fixed response for that class)
//! ```
//!
//! Full HTTP semantics and routing are delegated to a future router.

pub mod request;
pub mod response;

pub use request::{classify, RequestKind};
