//! Session endpoints for callers that already hold a valid access token.
//!
//! - GET `/me` - Identity and role the gateway verified
//! - POST `/logout` - Forget the caller's refresh token

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::{AuthenticatedIdentity, GatewayResponse};
use crate::db::Database;
use crate::session;

#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
}

pub fn router(state: SessionState) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Serialize)]
struct MeResponse {
    identity: String,
    role: Option<String>,
}

async fn me(auth: AuthenticatedIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        identity: auth.identity,
        role: auth.role,
    })
}

/// The access token stays valid until it expires; only the reissue path closes.
async fn logout(
    State(state): State<SessionState>,
    auth: AuthenticatedIdentity,
) -> Result<GatewayResponse, ApiError> {
    session::end_session(&state.db, &auth.identity)
        .await
        .db_err("Failed to end session")?;

    Ok(GatewayResponse::new(StatusCode::OK, "success logout"))
}
