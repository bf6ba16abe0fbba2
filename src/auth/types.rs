//! Authentication user types.

use crate::jwt::Claims;

/// Identity verified by the gateway, attached to forwarded requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Token subject (email-like identity)
    pub identity: String,
    /// Role claim of the access token
    pub role: Option<String>,
}

impl From<Claims> for AuthenticatedIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            identity: claims.sub,
            role: claims.role,
        }
    }
}
