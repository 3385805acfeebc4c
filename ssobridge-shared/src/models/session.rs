/// Server-side session records
///
/// Every platform session issued at login gets a row here. Access and
/// refresh tokens carry the row id (`sid`); revoking the row invalidates
/// both. Only the SHA-256 of the refresh token is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token_hash, created_at, last_refreshed_at, revoked_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,

    /// Hex SHA-256 of the refresh token
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,

    pub created_at: DateTime<Utc>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }

    /// Inserts a session with a caller-chosen id
    ///
    /// The id is generated up front because it is embedded in the refresh
    /// token whose hash is stored on the row.
    pub async fn create(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token_hash)
            VALUES ($1, $2, $3)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(refresh_token_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn touch_refresh(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET last_refreshed_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes the session; false if it was missing or already revoked
    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
