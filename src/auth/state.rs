//! Authentication state shared by every guarded route.

use std::sync::Arc;

use super::policy::RouteAuthConfig;
use crate::db::Database;
use crate::jwt::JwtConfig;

/// Trait for state types that provide database and JWT access for authentication.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtConfig;
    fn db(&self) -> &Database;
}

/// Signing material and refresh store, cloned into every route guard.
#[derive(Clone)]
pub struct GatewayState {
    pub jwt: Arc<JwtConfig>,
    pub db: Database,
}

impl HasAuthBackend for GatewayState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

/// Middleware state for one protected route: the shared backend plus the
/// route's own role policy.
#[derive(Clone)]
pub struct RouteGuard {
    pub backend: GatewayState,
    pub route: Arc<RouteAuthConfig>,
}

impl RouteGuard {
    pub fn new(backend: GatewayState, route: RouteAuthConfig) -> Self {
        Self {
            backend,
            route: Arc::new(route),
        }
    }
}
