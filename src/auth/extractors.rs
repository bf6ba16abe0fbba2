//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::GatewayRejection;
use super::types::AuthenticatedIdentity;

/// Reads the identity the gateway attached before forwarding.
/// Handlers using it must sit behind `auth_gateway`; otherwise every request
/// is rejected as unauthenticated.
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = GatewayRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or(GatewayRejection::MissingOrMalformedHeader)
    }
}
