//! Request-path authentication filter.
//!
//! For each request on a guarded route:
//! - `/health` is answered directly with 200, no credentials needed
//! - a missing or non-Bearer `Authorization` header is a bare 401
//! - a valid access token whose role is allowed is forwarded downstream
//! - an expired access token is exchanged for a new one using the identity's
//!   stored refresh token; the caller gets the new access token and retries,
//!   the original request is not forwarded
//! - anything else is rejected with a JSON envelope

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info};

use super::bearer::bearer_token;
use super::errors::{GatewayRejection, GatewayResponse, InvalidTokenReason};
use super::policy::RouteAuthConfig;
use super::state::{HasAuthBackend, RouteGuard};
use super::types::AuthenticatedIdentity;
use crate::db::RefreshTokenRecord;
use crate::jwt::{Claims, TokenKind, ValidationOutcome};
use crate::session;

/// Liveness path answered without authentication.
pub const HEALTH_PATH: &str = "/health";

/// Non-error results of evaluating a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// Liveness probe, answered with 200 `OK`
    Healthy,
    /// Hand the request to the downstream handler
    Forward(AuthenticatedIdentity),
    /// Respond 200 with this replacement access token
    Reissued(String),
}

/// Run the authentication state machine for one request.
pub async fn evaluate<S>(
    state: &S,
    route: &RouteAuthConfig,
    path: &str,
    headers: &HeaderMap,
) -> Result<GatewayOutcome, GatewayRejection>
where
    S: HasAuthBackend + Sync,
{
    if path == HEALTH_PATH {
        return Ok(GatewayOutcome::Healthy);
    }

    let token = bearer_token(headers).ok_or(GatewayRejection::MissingOrMalformedHeader)?;

    match state.jwt().validate(token) {
        ValidationOutcome::Valid(claims) => {
            if claims.kind != TokenKind::Access {
                return Err(GatewayRejection::InvalidToken(InvalidTokenReason::WrongKind));
            }
            if !route.is_allowed(claims.role.as_deref()) {
                debug!(identity = %claims.sub, role = ?claims.role, "Role not permitted");
                return Err(GatewayRejection::RoleDenied);
            }
            Ok(GatewayOutcome::Forward(claims.into()))
        }
        ValidationOutcome::Expired(claims) => {
            if claims.kind != TokenKind::Access {
                return Err(GatewayRejection::InvalidToken(InvalidTokenReason::WrongKind));
            }
            info!(identity = %claims.sub, "Access token expired, reissuing");
            reissue(state, claims).await.map(GatewayOutcome::Reissued)
        }
        outcome => {
            debug!(reason = outcome.label(), "Access token rejected");
            Err(GatewayRejection::InvalidToken(InvalidTokenReason::from(&outcome)))
        }
    }
}

/// Rotate the identity's refresh record and mint a new access token.
///
/// The rotation is delete-then-upsert without a transaction or per-identity
/// lock. Two requests reissuing for the same identity at once both succeed and
/// the later upsert decides which refresh token survives.
async fn reissue<S>(state: &S, expired: Claims) -> Result<String, GatewayRejection>
where
    S: HasAuthBackend + Sync,
{
    let identity = expired.sub;
    let store = state.db().refresh_tokens();

    let record = store
        .get(&identity)
        .await
        .map_err(|e| {
            error!(identity = %identity, error = %e, "Failed to read refresh record");
            GatewayRejection::StoreUnavailable
        })?
        .ok_or(GatewayRejection::RefreshRecordNotFound)?;

    match state.jwt().validate(&record.refresh_token) {
        ValidationOutcome::Valid(claims)
            if claims.kind == TokenKind::Refresh && claims.sub == identity => {}
        outcome => {
            info!(identity = %identity, reason = outcome.label(), "Stored refresh token rejected");
            return Err(GatewayRejection::RefreshTokenInvalid);
        }
    }

    store.delete(&identity).await.map_err(|e| {
        error!(identity = %identity, error = %e, "Failed to delete refresh record");
        GatewayRejection::StoreUnavailable
    })?;

    let tokens = session::mint_pair(state.jwt(), &identity, expired.role.as_deref()).map_err(|e| {
        error!(identity = %identity, error = %e, "Failed to mint reissued tokens");
        GatewayRejection::TokenIssueFailed
    })?;

    let record = RefreshTokenRecord::new(identity.as_str(), tokens.refresh_token).map_err(|e| {
        error!(identity = %identity, error = %e, "Failed to timestamp refresh record");
        GatewayRejection::TokenIssueFailed
    })?;

    store
        .upsert(&record)
        .await
        .map_err(|e| {
            error!(identity = %identity, error = %e, "Failed to store refresh record");
            GatewayRejection::StoreUnavailable
        })?;

    info!(identity = %identity, "Access token reissued");
    Ok(tokens.access_token)
}

/// Middleware guarding a route with `RouteGuard`.
///
/// Use with `axum::middleware::from_fn_with_state(guard, auth_gateway)`.
pub async fn auth_gateway(
    State(guard): State<RouteGuard>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let outcome = evaluate(&guard.backend, &guard.route, parts.uri.path(), &parts.headers).await;

    match outcome {
        Ok(GatewayOutcome::Healthy) => health_response(),
        Ok(GatewayOutcome::Forward(identity)) => {
            parts.extensions.insert(identity);
            next.run(Request::from_parts(parts, body)).await
        }
        Ok(GatewayOutcome::Reissued(access_token)) => {
            GatewayResponse::reissued(access_token).into_response()
        }
        Err(rejection) => {
            debug!(path = %parts.uri.path(), reason = %rejection, "Request rejected");
            rejection.into_response()
        }
    }
}

/// Plain-text 200 for load balancer probes.
pub async fn health() -> Response {
    health_response()
}

fn health_response() -> Response {
    (StatusCode::OK, "OK").into_response()
}
