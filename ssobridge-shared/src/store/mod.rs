/// Identity platform storage
///
/// [`IdentityStore`] is the seam between the HTTP layer, the reconciler and
/// the backing store. [`PgIdentityStore`] is the production implementation;
/// [`MemoryIdentityStore`] keeps everything in process for tests and local
/// demos.
///
/// # Example
///
/// ```
/// use ssobridge_shared::models::identity::{CreateIdentity, IdentityMetadata};
/// use ssobridge_shared::store::{IdentityStore, MemoryIdentityStore};
///
/// # async fn example() -> Result<(), ssobridge_shared::store::StoreError> {
/// let store = MemoryIdentityStore::new();
/// let identity = store
///     .create_identity(
///         CreateIdentity {
///             email: "a@b.com".to_string(),
///             metadata: IdentityMetadata::default(),
///             email_confirmed: true,
///         },
///         None,
///     )
///     .await?;
///
/// let found = store.find_identity_by_email("a@b.com").await?;
/// assert_eq!(found.map(|i| i.id), Some(identity.id));
/// # Ok(())
/// # }
/// ```

mod memory;
mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

use crate::models::{
    identity::{CreateIdentity, IdentityRecord},
    outbox::{PendingSsoLink, SsoLinkOutboxEntry},
    profile::Profile,
    session::SessionRecord,
    sso_integration::{NewSsoIntegration, SsoIntegration},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Store error type
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An identity with this email already exists
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the operation (used by the in-memory store)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage operations backing the identity platform
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Creates an identity, its profile row, and optionally an SSO-link
    /// outbox entry, atomically
    async fn create_identity(
        &self,
        data: CreateIdentity,
        link: Option<PendingSsoLink>,
    ) -> StoreResult<IdentityRecord>;

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>>;

    /// Indexed lookup by normalized email
    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>>;

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;

    async fn list_sso_integrations(&self, user_id: Uuid) -> StoreResult<Vec<SsoIntegration>>;

    /// Inserts an integration row; Ok(None) if the pair was already linked
    async fn insert_sso_integration(
        &self,
        data: &NewSsoIntegration,
    ) -> StoreResult<Option<SsoIntegration>>;

    async fn create_session(
        &self,
        id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
    ) -> StoreResult<SessionRecord>;

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>>;

    async fn touch_session(&self, id: Uuid) -> StoreResult<()>;

    /// Revokes a session; false if missing or already revoked
    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool>;

    /// Claims due outbox entries (see `SsoLinkOutboxEntry::claim_due`)
    async fn claim_due_links(
        &self,
        limit: usize,
        lease: chrono::Duration,
    ) -> StoreResult<Vec<SsoLinkOutboxEntry>>;

    async fn complete_link(&self, id: Uuid) -> StoreResult<()>;

    /// Records a failed link attempt; `retry_at = None` parks the entry
    async fn fail_link(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    async fn health_check(&self) -> StoreResult<()>;
}
