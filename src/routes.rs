//! Protected route table, loaded once at startup.
//!
//! ```json
//! { "routes": [
//!     { "path": "/members", "upstream": "http://member:8080",
//!       "allowed_roles": ["ROLE_USER", "ROLE_ADMIN"] }
//! ] }
//! ```

use std::collections::HashSet;

use serde::Deserialize;
use url::Url;

use crate::api::SESSION_API_PATH;
use crate::auth::{HEALTH_PATH, RouteAuthConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct RouteTable {
    pub routes: Vec<RouteEntry>,
}

/// One path prefix forwarded to one upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub path: String,
    pub upstream: Url,
    #[serde(flatten)]
    pub auth: RouteAuthConfig,
}

impl RouteTable {
    /// Parse and validate a route table from JSON text.
    pub fn parse(json: &str) -> Result<Self, RouteTableError> {
        let table: RouteTable = serde_json::from_str(json).map_err(RouteTableError::Parse)?;
        table.validate()?;
        Ok(table)
    }

    /// Read a route table from a file.
    pub fn load(path: &str) -> Result<Self, RouteTableError> {
        let content = std::fs::read_to_string(path).map_err(RouteTableError::Io)?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<(), RouteTableError> {
        let mut seen = HashSet::new();

        for entry in &self.routes {
            validate_path(&entry.path)?;

            if !seen.insert(entry.path.as_str()) {
                return Err(RouteTableError::Invalid(format!(
                    "Duplicate route path: {}",
                    entry.path
                )));
            }

            if !matches!(entry.upstream.scheme(), "http" | "https") {
                return Err(RouteTableError::Invalid(format!(
                    "Upstream for {} must be http or https: {}",
                    entry.path, entry.upstream
                )));
            }

            if entry.auth.allowed_roles().is_empty() {
                tracing::warn!(path = %entry.path, "Route allows no roles and will deny every request");
            }
        }

        Ok(())
    }
}

fn validate_path(path: &str) -> Result<(), RouteTableError> {
    if !path.starts_with('/') {
        return Err(RouteTableError::Invalid(format!(
            "Route path must start with '/': {}",
            path
        )));
    }

    if path.len() > 1 && path.ends_with('/') {
        return Err(RouteTableError::Invalid(format!(
            "Route path must not end with '/': {}",
            path
        )));
    }

    if path.chars().any(|c| !c.is_ascii() || c.is_whitespace() || c == '{' || c == '}') {
        return Err(RouteTableError::Invalid(format!(
            "Route path contains invalid characters: {}",
            path
        )));
    }

    if path == HEALTH_PATH {
        return Err(RouteTableError::Invalid(format!(
            "{} is reserved for the liveness check",
            HEALTH_PATH
        )));
    }

    if path == SESSION_API_PATH || path.starts_with(&format!("{}/", SESSION_API_PATH)) {
        return Err(RouteTableError::Invalid(format!(
            "{} is reserved for the session API",
            path
        )));
    }

    Ok(())
}

#[derive(Debug)]
pub enum RouteTableError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for RouteTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteTableError::Io(e) => write!(f, "Failed to read route table: {}", e),
            RouteTableError::Parse(e) => write!(f, "Failed to parse route table: {}", e),
            RouteTableError::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RouteTableError {}
