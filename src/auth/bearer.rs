//! Bearer credential parsing.

use axum::http::{HeaderMap, header};

/// Scheme prefix of the `Authorization` header, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Returns `None` when the header is absent, not valid UTF-8, or uses another
/// scheme. An empty token after the prefix is returned as-is and fails later
/// as a malformed token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
}
