use std::sync::Arc;

use clap::Parser;
use gatehouse::cli::{
    Args, build_config, handle_issue_session, init_logging, load_routes, load_signing_secret,
    open_database,
};
use gatehouse::jwt::JwtConfig;
use gatehouse::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(secret) = load_signing_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };
    let jwt = Arc::new(JwtConfig::new(&secret).with_lifetimes(args.lifetimes()));

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if let Some(identity) = args.issue_session.as_deref() {
        handle_issue_session(&jwt, &db, identity, &args.role).await;
        return;
    }

    let Some(routes) = load_routes(args.routes.as_deref()) else {
        std::process::exit(1);
    };

    let Some(config) = build_config(db, jwt, routes, args.session_roles) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    init_cleanup(&config.db).await;

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
