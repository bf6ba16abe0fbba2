pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod proxy;
pub mod routes;
pub mod session;

use api::create_api_router;
use auth::{GatewayState, HEALTH_PATH, RouteAuthConfig, RouteGuard, health};
use axum::{Router, routing::get};
use db::Database;
use jwt::JwtConfig;
use proxy::ProxyState;
use routes::RouteTable;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Refresh store (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing key and token lifetimes
    pub jwt: Arc<JwtConfig>,
    /// Protected routes and their upstreams
    pub routes: RouteTable,
    /// Roles allowed on the session API
    pub session_roles: RouteAuthConfig,
    /// Client used for every upstream request
    pub http_client: reqwest::Client,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let backend = GatewayState {
        jwt: config.jwt.clone(),
        db: config.db.clone(),
    };

    let api_router = auth::protect(
        create_api_router(config.db.clone()),
        RouteGuard::new(backend.clone(), config.session_roles.clone()),
    );

    let mut app = Router::new()
        .route(HEALTH_PATH, get(health))
        .merge(api_router);

    for route in &config.routes.routes {
        let proxied = proxy::router(
            &route.path,
            ProxyState {
                client: config.http_client.clone(),
                upstream: route.upstream.clone(),
            },
        );
        let guard = RouteGuard::new(backend.clone(), route.auth.clone());
        app = app.merge(auth::protect(proxied, guard));
    }

    app
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub async fn init_cleanup(db: &Database) {
    cleanup::run_cleanup(db).await;
    cleanup::spawn_cleanup_scheduler(db.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to run cleanup on startup.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config.db).await;

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
