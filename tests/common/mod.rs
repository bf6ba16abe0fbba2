//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use gatehouse::{
    ServerConfig,
    auth::RouteAuthConfig,
    create_app,
    db::Database,
    jwt::{JwtConfig, TokenKind},
    proxy,
    routes::RouteTable,
};

pub const ALICE: &str = "alice@example.com";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl TestApp {
    /// App with no proxied routes, only `/health` and the session API.
    pub async fn new() -> Self {
        Self::with_routes(RouteTable { routes: Vec::new() }).await
    }

    pub async fn with_routes(routes: RouteTable) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let jwt = test_jwt();
        let config = server_config(db.clone(), jwt.clone(), routes);

        Self {
            app: create_app(&config),
            db,
            jwt,
        }
    }

    pub fn access_token(&self, identity: &str, role: &str) -> String {
        self.jwt
            .create_access(identity, Some(role))
            .expect("Failed to create access token")
            .token
    }

    pub fn expired_access_token(&self, identity: &str, role: &str) -> String {
        self.jwt
            .create(identity, Some(role), TokenKind::Access, Duration::ZERO)
            .expect("Failed to create access token")
            .token
    }
}

pub fn test_jwt() -> Arc<JwtConfig> {
    Arc::new(JwtConfig::new(b"integration-test-secret"))
}

/// Config with the default session roles and the given routes.
pub fn server_config(db: Database, jwt: Arc<JwtConfig>, routes: RouteTable) -> ServerConfig {
    ServerConfig {
        db,
        jwt,
        routes,
        session_roles: RouteAuthConfig::new(["ROLE_USER", "ROLE_ADMIN"]),
        http_client: proxy::build_client().expect("Failed to build client"),
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
