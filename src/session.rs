//! Minting and ending sessions.
//!
//! A session is an access/refresh token pair whose refresh half is recorded in
//! the refresh store. Login services call `issue_session` after verifying
//! credentials; the gateway reuses `mint_pair` when it reissues.

use serde::Serialize;

use crate::db::{Database, RefreshTokenRecord};
use crate::jwt::{JwtConfig, JwtError};

/// A freshly minted access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub identity: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Mint a new pair without touching the store.
pub fn mint_pair(
    jwt: &JwtConfig,
    identity: &str,
    role: Option<&str>,
) -> Result<SessionTokens, SessionError> {
    let access = jwt.create_access(identity, role).map_err(SessionError::Token)?;
    let refresh = jwt.create_refresh(identity, role).map_err(SessionError::Token)?;

    Ok(SessionTokens {
        identity: identity.to_string(),
        access_token: access.token,
        refresh_token: refresh.token,
    })
}

/// Mint a pair and record its refresh token, replacing any earlier session.
pub async fn issue_session(
    jwt: &JwtConfig,
    db: &Database,
    identity: &str,
    role: &str,
) -> Result<SessionTokens, SessionError> {
    let tokens = mint_pair(jwt, identity, Some(role))?;

    let record = RefreshTokenRecord::new(identity, tokens.refresh_token.as_str())
        .map_err(SessionError::Token)?;

    db.refresh_tokens()
        .upsert(&record)
        .await
        .map_err(SessionError::Store)?;

    tracing::info!(identity = %identity, "Session issued");
    Ok(tokens)
}

/// Forget the identity's refresh token. Returns whether one existed.
pub async fn end_session(db: &Database, identity: &str) -> Result<bool, SessionError> {
    let removed = db
        .refresh_tokens()
        .delete(identity)
        .await
        .map_err(SessionError::Store)?;

    tracing::info!(identity = %identity, removed, "Session ended");
    Ok(removed)
}

#[derive(Debug)]
pub enum SessionError {
    Token(JwtError),
    Store(sqlx::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Token(e) => write!(f, "Failed to mint token: {}", e),
            SessionError::Store(e) => write!(f, "Refresh store error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::{TokenKind, ValidationOutcome};

    #[tokio::test]
    async fn test_issue_session_records_refresh_token() {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = JwtConfig::new(b"session-test-secret");

        let tokens = issue_session(&jwt, &db, "alice@example.com", "ROLE_USER")
            .await
            .unwrap();

        let record = db
            .refresh_tokens()
            .get("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.refresh_token, tokens.refresh_token);

        match jwt.validate(&tokens.access_token) {
            ValidationOutcome::Valid(claims) => {
                assert_eq!(claims.kind, TokenKind::Access);
                assert_eq!(claims.role.as_deref(), Some("ROLE_USER"));
            }
            other => panic!("expected valid access token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_login_replaces_session() {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = JwtConfig::new(b"session-test-secret");

        let first = issue_session(&jwt, &db, "alice@example.com", "ROLE_USER")
            .await
            .unwrap();
        let second = issue_session(&jwt, &db, "alice@example.com", "ROLE_USER")
            .await
            .unwrap();

        let record = db
            .refresh_tokens()
            .get("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(record.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn test_end_session() {
        let db = Database::open(":memory:").await.unwrap();
        let jwt = JwtConfig::new(b"session-test-secret");

        issue_session(&jwt, &db, "alice@example.com", "ROLE_USER")
            .await
            .unwrap();

        assert!(end_session(&db, "alice@example.com").await.unwrap());
        assert!(!end_session(&db, "alice@example.com").await.unwrap());
    }
}
