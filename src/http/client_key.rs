//! Client identifier extraction.
//!
//! The rate limiter keys on an opaque per-client string: the first entry
//! of `X-Forwarded-For` when a proxy in front of us supplies one, else
//! the peer socket address.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Extract the client identifier for a request. `None` means the client
/// cannot be identified and the request must be rejected with 401.
pub fn extract(headers: &HeaderMap, peer: SocketAddr) -> Option<String> {
    if let Some(forwarded) = headers.get(X_FORWARDED_FOR) {
        let forwarded = forwarded.to_str().ok()?;
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return Some(first.to_string());
        }
        return None;
    }

    Some(peer.ip().to_string())
}
