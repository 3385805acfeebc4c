/// SSO-link outbox
///
/// Signup enqueues one entry per new identity in the same transaction that
/// creates it. The reconciler claims due entries, writes the matching
/// `sso_integrations` row and marks the entry complete. A failed attempt is
/// rescheduled; an entry with `next_attempt_at = NULL` and no
/// `completed_at` is parked and needs an operator.
///
/// # Lifecycle
///
/// ```text
/// enqueue ──> due ──claim──> in flight ──complete──> done
///              ^                 │
///              └──── fail(retry_at) ───┘
///                                │
///                          fail(None) ──> parked
/// ```

use crate::models::sso_integration::NewSsoIntegration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const OUTBOX_COLUMNS: &str = "id, user_id, provider, external_user_id, attempts, last_error, \
                              next_attempt_at, completed_at, created_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SsoLinkOutboxEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub external_user_id: String,

    /// Number of claims so far, including the one in flight
    pub attempts: i32,

    pub last_error: Option<String>,

    /// When the entry becomes claimable; None once completed or parked
    pub next_attempt_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Link to enqueue alongside a new identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSsoLink {
    pub provider: String,
    pub external_user_id: String,
}

impl SsoLinkOutboxEntry {
    /// The integration row this entry should produce
    pub fn to_integration(&self) -> NewSsoIntegration {
        NewSsoIntegration {
            user_id: self.user_id,
            provider: self.provider.clone(),
            external_user_id: self.external_user_id.clone(),
        }
    }

    pub fn is_parked(&self) -> bool {
        self.completed_at.is_none() && self.next_attempt_at.is_none()
    }

    /// Enqueues an entry that is due immediately
    pub async fn enqueue(
        conn: &mut PgConnection,
        user_id: Uuid,
        link: &PendingSsoLink,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SsoLinkOutboxEntry>(&format!(
            r#"
            INSERT INTO sso_link_outbox (user_id, provider, external_user_id, next_attempt_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING {OUTBOX_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&link.provider)
        .bind(&link.external_user_id)
        .fetch_one(conn)
        .await
    }

    /// Claims up to `limit` due entries
    ///
    /// Claimed entries get their attempt counter bumped and are pushed
    /// `lease_seconds` into the future so a crashed worker's claims become
    /// due again. `SKIP LOCKED` keeps concurrent workers off each other's rows.
    pub async fn claim_due(
        pool: &PgPool,
        limit: i64,
        lease_seconds: f64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let entries = sqlx::query_as::<_, SsoLinkOutboxEntry>(
            r#"
            WITH due AS (
                SELECT id
                FROM sso_link_outbox
                WHERE completed_at IS NULL
                  AND next_attempt_at IS NOT NULL
                  AND next_attempt_at <= NOW()
                ORDER BY next_attempt_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE sso_link_outbox
            SET
                attempts = sso_link_outbox.attempts + 1,
                next_attempt_at = NOW() + make_interval(secs => $2)
            FROM due
            WHERE sso_link_outbox.id = due.id
            RETURNING
                sso_link_outbox.id,
                sso_link_outbox.user_id,
                sso_link_outbox.provider,
                sso_link_outbox.external_user_id,
                sso_link_outbox.attempts,
                sso_link_outbox.last_error,
                sso_link_outbox.next_attempt_at,
                sso_link_outbox.completed_at,
                sso_link_outbox.created_at
            "#,
        )
        .bind(limit)
        .bind(lease_seconds)
        .fetch_all(pool)
        .await?;

        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "Claimed SSO-link outbox entries");
        }

        Ok(entries)
    }

    pub async fn complete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sso_link_outbox
            SET completed_at = NOW(), next_attempt_at = NULL, last_error = NULL
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a failed attempt; `retry_at = None` parks the entry
    pub async fn fail(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE sso_link_outbox
            SET last_error = $2, next_attempt_at = $3
            WHERE id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
