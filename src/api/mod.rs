mod error;
mod session;

use axum::Router;

use crate::db::Database;

pub use error::{ApiError, ResultExt};
pub use session::SessionState;

/// Prefix of the session endpoints.
pub const SESSION_API_PATH: &str = "/auth";

/// Create the session API router. Mount it behind the gateway.
pub fn create_api_router(db: Database) -> Router {
    Router::new().nest(SESSION_API_PATH, session::router(SessionState { db }))
}
