//! Request classification.
//!
//! The admission layer is a transport demultiplexer, not a router: it only
//! looks at the leading token to decide which fixed response to send.

/// Prefix that marks a fetch-style request.
pub const FETCH_PREFIX: &[u8] = b"GET ";

/// What a request looks like from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Starts with `GET `.
    Fetch,
    /// Anything else, including a blank line.
    Unrecognized,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Fetch => "fetch",
            RequestKind::Unrecognized => "unrecognized",
        }
    }
}

/// Classify a request by its leading token.
pub fn classify(request: &[u8]) -> RequestKind {
    if request.starts_with(FETCH_PREFIX) {
        RequestKind::Fetch
    } else {
        RequestKind::Unrecognized
    }
}
