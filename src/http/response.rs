//! Fixed responses written by session workers.
//!
//! Placeholders until a router is attached; the bodies are not a contract.

use crate::http::request::RequestKind;

pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
X-Content-Type-Options: nosniff\r\n\
Content-Length: 19\r\n\
\r\n\
404 page not found\n";

pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\
Content-Type: text/plain\r\n\
Connection: close\r\n\
\r\n\
400 Bad Request";

/// Response bytes for a classified request.
pub fn for_request(kind: RequestKind) -> &'static [u8] {
    match kind {
        RequestKind::Fetch => NOT_FOUND,
        RequestKind::Unrecognized => BAD_REQUEST,
    }
}
