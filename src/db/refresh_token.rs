//! Refresh token storage, one live record per identity.
//!
//! Records expire 30 days after they were written. Expired rows are invisible
//! to `get` and are purged by the cleanup scheduler. Nothing here locks: a
//! rotation is a `delete` followed by an `upsert`, and concurrent rotations for
//! one identity resolve as last writer wins.

use std::time::{Duration, SystemTime};

use sqlx::sqlite::SqlitePool;

use crate::jwt::{JwtError, unix_now, unix_secs};

/// Time-to-live of a refresh record: 30 days
pub const REFRESH_RECORD_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The current refresh token of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub identity: String,
    pub refresh_token: String,
    /// Unix seconds; the TTL counts from here
    pub created_at: i64,
}

impl RefreshTokenRecord {
    /// A record created now.
    pub fn new(
        identity: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Result<Self, JwtError> {
        Self::with_creation_time(identity, refresh_token, SystemTime::now())
    }

    /// A record whose TTL starts at `created`.
    pub fn with_creation_time(
        identity: impl Into<String>,
        refresh_token: impl Into<String>,
        created: SystemTime,
    ) -> Result<Self, JwtError> {
        Ok(Self {
            identity: identity.into(),
            refresh_token: refresh_token.into(),
            created_at: unix_secs(created)? as i64,
        })
    }

    /// Unix seconds after which the record is gone.
    pub fn expires_at(&self) -> i64 {
        self.created_at + REFRESH_RECORD_TTL.as_secs() as i64
    }
}

/// Store for refresh token records keyed by identity.
#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the live record for an identity.
    pub async fn get(&self, identity: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT identity, refresh_token, created_at FROM refresh_tokens WHERE identity = ? AND expires_at > ?",
        )
        .bind(identity)
        .bind(now_secs()?)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(identity, refresh_token, created_at)| RefreshTokenRecord {
            identity,
            refresh_token,
            created_at,
        }))
    }

    /// Insert a record, replacing whatever the identity had before.
    /// The TTL restarts from `record.created_at`.
    pub async fn upsert(&self, record: &RefreshTokenRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (identity, refresh_token, created_at, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(identity) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
        )
        .bind(&record.identity)
        .bind(&record.refresh_token)
        .bind(record.created_at)
        .bind(record.expires_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the record for an identity. Returns whether a row was removed;
    /// deleting an absent record is not an error.
    pub async fn delete(&self, identity: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired records.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now_secs()?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count records, expired or not.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Current time for expiry comparisons. A clock before the epoch fails the
/// query rather than treating every record as live.
fn now_secs() -> Result<i64, sqlx::Error> {
    unix_now()
        .map(|s| s as i64)
        .map_err(|e| sqlx::Error::Io(std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    const DAY: i64 = 24 * 60 * 60;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.refresh_tokens();

        let record = RefreshTokenRecord::new("alice@example.com", "token-1").unwrap();
        store.upsert(&record).await.unwrap();

        let stored = store.get("alice@example.com").await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert!(store.get("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_record() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.refresh_tokens();

        store
            .upsert(&RefreshTokenRecord::new("alice@example.com", "token-1").unwrap())
            .await
            .unwrap();
        store
            .upsert(&RefreshTokenRecord::new("alice@example.com", "token-2").unwrap())
            .await
            .unwrap();

        let stored = store.get("alice@example.com").await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "token-2");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_restarts_ttl() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.refresh_tokens();

        let mut stale = RefreshTokenRecord::new("alice@example.com", "token-1").unwrap();
        stale.created_at -= 31 * DAY;
        store.upsert(&stale).await.unwrap();
        assert!(store.get("alice@example.com").await.unwrap().is_none());

        store
            .upsert(&RefreshTokenRecord::new("alice@example.com", "token-2").unwrap())
            .await
            .unwrap();
        assert!(store.get("alice@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.refresh_tokens();

        store
            .upsert(&RefreshTokenRecord::new("alice@example.com", "token-1").unwrap())
            .await
            .unwrap();

        assert!(store.delete("alice@example.com").await.unwrap());
        assert!(!store.delete("alice@example.com").await.unwrap());
        assert!(store.get("alice@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_invisible_and_purged() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.refresh_tokens();

        let mut expired = RefreshTokenRecord::new("alice@example.com", "old").unwrap();
        expired.created_at -= 30 * DAY;
        store.upsert(&expired).await.unwrap();
        store
            .upsert(&RefreshTokenRecord::new("bob@example.com", "fresh").unwrap())
            .await
            .unwrap();

        assert!(store.get("alice@example.com").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 2);

        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get("bob@example.com").await.unwrap().is_some());
    }

    #[test]
    fn test_expires_at_is_thirty_days_after_creation() {
        let record = RefreshTokenRecord {
            identity: "alice@example.com".to_string(),
            refresh_token: "t".to_string(),
            created_at: 1_000,
        };
        assert_eq!(record.expires_at(), 1_000 + 30 * DAY);
    }

    #[test]
    fn test_creation_time_before_epoch_is_an_error() {
        let before = std::time::UNIX_EPOCH
            .checked_sub(Duration::from_secs(60))
            .unwrap();
        let result = RefreshTokenRecord::with_creation_time("alice@example.com", "t", before);
        assert!(matches!(result, Err(JwtError::TimeError)));
    }

    #[test]
    fn test_new_record_starts_now() {
        let now = unix_now().unwrap() as i64;
        let record = RefreshTokenRecord::new("alice@example.com", "t").unwrap();
        assert!(record.created_at >= now && record.created_at - now <= 1);
    }
}
