//! Request inspection done by the host runtime before emission.
//!
//! # Responsibilities
//! - Assign a request ID (UUID v4) when the client did not send one
//! - Decide whether a request is an upgrade (emitted as `upgrade`, not
//!   `request`)

use axum::http::{header, HeaderMap, HeaderValue, Request};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Return the request's ID, inserting a fresh one if missing or unreadable.
pub fn ensure_request_id<B>(req: &mut Request<B>) -> String {
    if let Some(id) = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
    {
        return id.to_string();
    }

    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        req.headers_mut().insert(X_REQUEST_ID, value);
    }
    id
}

/// An HTTP/1.1 upgrade: an `Upgrade` header plus `upgrade` among the
/// `Connection` tokens.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    if !headers.contains_key(header::UPGRADE) {
        return false;
    }

    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
}
