use super::{IdentityStore, StoreError, StoreResult};
use crate::db::pool;
use crate::models::{
    identity::{CreateIdentity, IdentityRecord, EMAIL_UNIQUE_CONSTRAINT},
    outbox::{PendingSsoLink, SsoLinkOutboxEntry},
    profile::Profile,
    session::SessionRecord,
    sso_integration::{NewSsoIntegration, SsoIntegration},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed identity store
#[derive(Debug, Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_email_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT),
        _ => false,
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn create_identity(
        &self,
        data: CreateIdentity,
        link: Option<PendingSsoLink>,
    ) -> StoreResult<IdentityRecord> {
        let email = data.email.clone();
        let mut tx = self.pool.begin().await?;

        let identity = match IdentityRecord::create(&mut tx, data).await {
            Ok(identity) => identity,
            Err(e) if is_email_conflict(&e) => return Err(StoreError::EmailTaken(email)),
            Err(e) => return Err(e.into()),
        };

        Profile::create(
            &mut tx,
            identity.id,
            &identity.email,
            identity.metadata.full_name.as_deref(),
        )
        .await?;

        if let Some(link) = link {
            SsoLinkOutboxEntry::enqueue(&mut tx, identity.id, &link).await?;
        }

        tx.commit().await?;
        Ok(identity)
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        Ok(IdentityRecord::find_by_id(&self.pool, id).await?)
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        Ok(IdentityRecord::find_by_email(&self.pool, email).await?)
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(Profile::find_by_id(&self.pool, user_id).await?)
    }

    async fn list_sso_integrations(&self, user_id: Uuid) -> StoreResult<Vec<SsoIntegration>> {
        Ok(SsoIntegration::list_by_user(&self.pool, user_id).await?)
    }

    async fn insert_sso_integration(
        &self,
        data: &NewSsoIntegration,
    ) -> StoreResult<Option<SsoIntegration>> {
        Ok(SsoIntegration::insert_if_absent(&self.pool, data).await?)
    }

    async fn create_session(
        &self,
        id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
    ) -> StoreResult<SessionRecord> {
        Ok(SessionRecord::create(&self.pool, id, user_id, refresh_token_hash).await?)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        Ok(SessionRecord::find_by_id(&self.pool, id).await?)
    }

    async fn touch_session(&self, id: Uuid) -> StoreResult<()> {
        SessionRecord::touch_refresh(&self.pool, id).await?;
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool> {
        Ok(SessionRecord::revoke(&self.pool, id).await?)
    }

    async fn claim_due_links(
        &self,
        limit: usize,
        lease: chrono::Duration,
    ) -> StoreResult<Vec<SsoLinkOutboxEntry>> {
        let lease_seconds = lease.num_milliseconds() as f64 / 1000.0;
        Ok(SsoLinkOutboxEntry::claim_due(&self.pool, limit as i64, lease_seconds).await?)
    }

    async fn complete_link(&self, id: Uuid) -> StoreResult<()> {
        SsoLinkOutboxEntry::complete(&self.pool, id).await?;
        Ok(())
    }

    async fn fail_link(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        SsoLinkOutboxEntry::fail(&self.pool, id, error, retry_at).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(pool::health_check(&self.pool).await?)
    }
}
