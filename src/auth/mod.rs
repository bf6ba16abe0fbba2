//! Bearer-token authentication with role-based access control.
//!
//! Access tokens are stateless and checked on every request. When one expires
//! the gateway reissues it from the refresh token stored for that identity and
//! rotates the stored refresh token at the same time.

mod bearer;
mod errors;
mod extractors;
mod gateway;
mod policy;
mod state;
mod types;

pub use bearer::{BEARER_PREFIX, bearer_token};
pub use errors::{GatewayRejection, GatewayResponse, InvalidTokenReason};
pub use gateway::{GatewayOutcome, HEALTH_PATH, auth_gateway, evaluate, health};
pub use policy::RouteAuthConfig;
pub use state::{GatewayState, HasAuthBackend, RouteGuard};
pub use types::AuthenticatedIdentity;

use axum::{Router, middleware};

/// Put every route of `router` behind the gateway with the given guard.
pub fn protect<S>(router: Router<S>, guard: RouteGuard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(guard, auth_gateway))
}
