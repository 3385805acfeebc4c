/// SSO integration rows
///
/// Append-only link records tying an identity to a provider's user id.
/// At most one row exists per `(user_id, provider)`; inserting an existing
/// pair is a no-op, which makes the reconciler safe to re-run.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sso_integrations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES identity_records (id),
///     provider TEXT NOT NULL,
///     external_user_id TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (user_id, provider)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Provider name used for links created by the auth proxy
pub const CUSTOM_PROVIDER: &str = "custom";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SsoIntegration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub external_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting an SSO integration row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSsoIntegration {
    pub user_id: Uuid,
    pub provider: String,
    pub external_user_id: String,
}

impl SsoIntegration {
    /// Inserts the row unless one already exists for `(user_id, provider)`
    ///
    /// Returns None when the pair was already linked.
    pub async fn insert_if_absent(
        pool: &PgPool,
        data: &NewSsoIntegration,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SsoIntegration>(
            r#"
            INSERT INTO sso_integrations (user_id, provider, external_user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, provider) DO NOTHING
            RETURNING id, user_id, provider, external_user_id, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(&data.provider)
        .bind(&data.external_user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists a user's integrations, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SsoIntegration>(
            r#"
            SELECT id, user_id, provider, external_user_id, created_at
            FROM sso_integrations
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
