//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::Parser;
use tracing::{error, info, warn};

use crate::ServerConfig;
use crate::auth::RouteAuthConfig;
use crate::db::Database;
use crate::jwt::{JwtConfig, TokenLifetimes};
use crate::proxy;
use crate::routes::RouteTable;
use crate::session;

/// Minimum decoded length of the HMAC signing secret.
const MIN_JWT_SECRET_BYTES: usize = 32;

const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Longest accepted token lifetime: 10 years
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "gatehouse",
    about = "Bearer-token authentication gateway with role-based routing"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "GATEHOUSE_PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file holding refresh tokens
    #[arg(short, long, env = "GATEHOUSE_DATABASE", default_value = "gatehouse.db")]
    pub database: String,

    /// Path to the JSON route table
    #[arg(short, long, env = "GATEHOUSE_ROUTES")]
    pub routes: Option<String>,

    /// Path to file containing the base64 JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "GATEHOUSE_ACCESS_TTL_SECS", default_value = "1800",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS))]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "GATEHOUSE_REFRESH_TTL_SECS", default_value = "2592000",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TTL_SECS))]
    pub refresh_ttl_secs: u64,

    /// Roles allowed on /auth/me and /auth/logout
    #[arg(long, env = "GATEHOUSE_SESSION_ROLES", value_delimiter = ',',
        default_value = "ROLE_USER,ROLE_ADMIN")]
    pub session_roles: Vec<String>,

    /// Issue a session for this identity, print the token pair as JSON and exit
    #[arg(long, value_name = "IDENTITY")]
    pub issue_session: Option<String>,

    /// Role claim for --issue-session
    #[arg(long, requires = "issue_session", default_value = "ROLE_USER")]
    pub role: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: Duration::from_secs(self.access_ttl_secs),
            refresh: Duration::from_secs(self.refresh_ttl_secs),
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the signing secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_signing_secret(jwt_secret_file: Option<&str>) -> Option<Vec<u8>> {
    let encoded = if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(JWT_SECRET_ENV) };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    decode_secret(&encoded)
}

fn decode_secret(encoded: &str) -> Option<Vec<u8>> {
    let secret = match STANDARD.decode(encoded.trim()) {
        Ok(secret) => secret,
        Err(e) => {
            error!(error = %e, "JWT secret is not valid base64");
            return None;
        }
    };

    if secret.len() < MIN_JWT_SECRET_BYTES {
        error!(
            "JWT secret decodes to fewer than {} bytes. Use a longer secret",
            MIN_JWT_SECRET_BYTES
        );
        return None;
    }

    Some(secret)
}

/// Load the route table, or an empty one when no file is given.
/// Returns None and logs an error if the table is invalid.
pub fn load_routes(path: Option<&str>) -> Option<RouteTable> {
    let Some(path) = path else {
        warn!("No route table given, only the session API is served");
        return Some(RouteTable { routes: Vec::new() });
    };

    match RouteTable::load(path) {
        Ok(table) => {
            info!(path = %path, routes = table.routes.len(), "Route table loaded");
            Some(table)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Invalid route table");
            None
        }
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

/// Handle the --issue-session flag: mint a session and print it as JSON.
pub async fn handle_issue_session(jwt: &JwtConfig, db: &Database, identity: &str, role: &str) {
    let tokens = match session::issue_session(jwt, db, identity, role).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!(identity = %identity, error = %e, "Failed to issue session");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&tokens) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!(error = %e, "Failed to serialize session");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the HTTP client cannot be created.
pub fn build_config(
    db: Database,
    jwt: Arc<JwtConfig>,
    routes: RouteTable,
    session_roles: Vec<String>,
) -> Option<ServerConfig> {
    let http_client = match proxy::build_client() {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create upstream HTTP client");
            return None;
        }
    };

    Some(ServerConfig {
        db,
        jwt,
        routes,
        session_roles: RouteAuthConfig::new(session_roles),
        http_client,
    })
}
