//! Response hardening for the JSON API.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Headers stamped onto every API response.
///
/// Challenges and session tokens travel in these bodies, and tokens may ride
/// in the `session-token` query parameter, so nothing may be cached and no
/// URL may leak through `Referer`.
pub const API_RESPONSE_HEADERS: [(&str, &str); 4] = [
    ("cache-control", "no-store"),
    ("referrer-policy", "no-referrer"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
];

/// Middleware that applies [`API_RESPONSE_HEADERS`], overriding any value a
/// handler set.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in API_RESPONSE_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }

    response
}
