use super::{IdentityStore, StoreError, StoreResult};
use crate::models::{
    identity::{CreateIdentity, IdentityRecord},
    outbox::{PendingSsoLink, SsoLinkOutboxEntry},
    profile::Profile,
    session::SessionRecord,
    sso_integration::{NewSsoIntegration, SsoIntegration},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryState {
    identities: HashMap<Uuid, IdentityRecord>,
    /// Unique email index
    by_email: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    integrations: Vec<SsoIntegration>,
    outbox: HashMap<Uuid, SsoLinkOutboxEntry>,
    sessions: HashMap<Uuid, SessionRecord>,
}

/// In-process identity store
///
/// Mirrors the Postgres constraints (unique email, unique
/// `(user_id, provider)`) and supports failure injection so tests can
/// exercise the error paths of the proxy and the reconciler.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    state: RwLock<MemoryState>,
    fail_identity_creation: AtomicBool,
    fail_session_creation: AtomicBool,
    failing_sso_inserts: AtomicU32,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_identity` call fail until reset
    pub fn set_fail_identity_creation(&self, fail: bool) {
        self.fail_identity_creation.store(fail, Ordering::SeqCst);
    }

    /// Makes every `create_session` call fail until reset
    pub fn set_fail_session_creation(&self, fail: bool) {
        self.fail_session_creation.store(fail, Ordering::SeqCst);
    }

    /// Fails the next `count` integration inserts
    pub fn fail_next_sso_inserts(&self, count: u32) {
        self.failing_sso_inserts.store(count, Ordering::SeqCst);
    }

    pub async fn identity_count(&self) -> usize {
        self.state.read().await.identities.len()
    }

    pub async fn sso_integration_count(&self) -> usize {
        self.state.read().await.integrations.len()
    }

    /// Snapshot of the outbox, oldest first
    pub async fn outbox_entries(&self) -> Vec<SsoLinkOutboxEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state.outbox.values().cloned().collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    fn take_sso_failure(&self) -> bool {
        self.failing_sso_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn create_identity(
        &self,
        data: CreateIdentity,
        link: Option<PendingSsoLink>,
    ) -> StoreResult<IdentityRecord> {
        if self.fail_identity_creation.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("identity creation disabled".to_string()));
        }

        let mut state = self.state.write().await;
        if state.by_email.contains_key(&data.email) {
            return Err(StoreError::EmailTaken(data.email));
        }

        let now = Utc::now();
        let identity = IdentityRecord {
            id: Uuid::new_v4(),
            email: data.email,
            metadata: data.metadata,
            email_confirmed_at: data.email_confirmed.then_some(now),
            created_at: now,
            updated_at: now,
        };

        state.by_email.insert(identity.email.clone(), identity.id);
        state.profiles.insert(
            identity.id,
            Profile {
                id: identity.id,
                email: identity.email.clone(),
                full_name: identity.metadata.full_name.clone(),
                avatar_url: None,
                created_at: now,
            },
        );

        if let Some(link) = link {
            let entry = SsoLinkOutboxEntry {
                id: Uuid::new_v4(),
                user_id: identity.id,
                provider: link.provider,
                external_user_id: link.external_user_id,
                attempts: 0,
                last_error: None,
                next_attempt_at: Some(now),
                completed_at: None,
                created_at: now,
            };
            state.outbox.insert(entry.id, entry);
        }

        state.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn find_identity_by_id(&self, id: Uuid) -> StoreResult<Option<IdentityRecord>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> StoreResult<Option<IdentityRecord>> {
        let state = self.state.read().await;
        Ok(state
            .by_email
            .get(email)
            .and_then(|id| state.identities.get(id))
            .cloned())
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }

    async fn list_sso_integrations(&self, user_id: Uuid) -> StoreResult<Vec<SsoIntegration>> {
        let state = self.state.read().await;
        Ok(state
            .integrations
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_sso_integration(
        &self,
        data: &NewSsoIntegration,
    ) -> StoreResult<Option<SsoIntegration>> {
        if self.take_sso_failure() {
            return Err(StoreError::Unavailable("sso integration insert failed".to_string()));
        }

        let mut state = self.state.write().await;
        let exists = state
            .integrations
            .iter()
            .any(|i| i.user_id == data.user_id && i.provider == data.provider);
        if exists {
            return Ok(None);
        }

        let row = SsoIntegration {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            provider: data.provider.clone(),
            external_user_id: data.external_user_id.clone(),
            created_at: Utc::now(),
        };
        state.integrations.push(row.clone());
        Ok(Some(row))
    }

    async fn create_session(
        &self,
        id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
    ) -> StoreResult<SessionRecord> {
        if self.fail_session_creation.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("session creation disabled".to_string()));
        }

        let session = SessionRecord {
            id,
            user_id,
            refresh_token_hash: refresh_token_hash.to_string(),
            created_at: Utc::now(),
            last_refreshed_at: None,
            revoked_at: None,
        };
        self.state.write().await.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        Ok(self.state.read().await.sessions.get(&id).cloned())
    }

    async fn touch_session(&self, id: Uuid) -> StoreResult<()> {
        if let Some(session) = self.state.write().await.sessions.get_mut(&id) {
            if session.revoked_at.is_none() {
                session.last_refreshed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_due_links(
        &self,
        limit: usize,
        lease: chrono::Duration,
    ) -> StoreResult<Vec<SsoLinkOutboxEntry>> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = state
            .outbox
            .values()
            .filter(|e| e.completed_at.is_none())
            .filter_map(|e| e.next_attempt_at.filter(|at| *at <= now).map(|at| (at, e.id)))
            .collect();
        due.sort();

        let mut claimed = Vec::new();
        for (_, id) in due.into_iter().take(limit) {
            if let Some(entry) = state.outbox.get_mut(&id) {
                entry.attempts += 1;
                entry.next_attempt_at = Some(now + lease);
                claimed.push(entry.clone());
            }
        }

        Ok(claimed)
    }

    async fn complete_link(&self, id: Uuid) -> StoreResult<()> {
        if let Some(entry) = self.state.write().await.outbox.get_mut(&id) {
            if entry.completed_at.is_none() {
                entry.completed_at = Some(Utc::now());
                entry.next_attempt_at = None;
                entry.last_error = None;
            }
        }
        Ok(())
    }

    async fn fail_link(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        if let Some(entry) = self.state.write().await.outbox.get_mut(&id) {
            if entry.completed_at.is_none() {
                entry.last_error = Some(error.to_string());
                entry.next_attempt_at = retry_at;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::IdentityMetadata;

    fn new_identity(email: &str) -> CreateIdentity {
        CreateIdentity {
            email: email.to_string(),
            metadata: IdentityMetadata {
                full_name: Some("A B".to_string()),
                backend_user_id: Some("1".to_string()),
                roles: vec!["user".to_string()],
            },
            email_confirmed: true,
        }
    }

    fn custom_link(external_user_id: &str) -> PendingSsoLink {
        PendingSsoLink {
            provider: "custom".to_string(),
            external_user_id: external_user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_identity_writes_profile_and_outbox() {
        let store = MemoryIdentityStore::new();
        let identity = store
            .create_identity(new_identity("a@b.com"), Some(custom_link("1")))
            .await
            .unwrap();

        assert!(identity.email_confirmed_at.is_some());

        let profile = store.find_profile(identity.id).await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("A B"));

        let outbox = store.outbox_entries().await;
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].user_id, identity.id);
        assert_eq!(outbox[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let store = MemoryIdentityStore::new();
        store.create_identity(new_identity("a@b.com"), None).await.unwrap();

        let err = store
            .create_identity(new_identity("a@b.com"), Some(custom_link("2")))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::EmailTaken(email) if email == "a@b.com"));
        assert_eq!(store.identity_count().await, 1);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_sso_insert_is_idempotent_per_provider() {
        let store = MemoryIdentityStore::new();
        let identity = store.create_identity(new_identity("a@b.com"), None).await.unwrap();
        let link = NewSsoIntegration {
            user_id: identity.id,
            provider: "custom".to_string(),
            external_user_id: "1".to_string(),
        };

        assert!(store.insert_sso_integration(&link).await.unwrap().is_some());
        assert!(store.insert_sso_integration(&link).await.unwrap().is_none());
        assert_eq!(store.list_sso_integrations(identity.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_leases_entries() {
        let store = MemoryIdentityStore::new();
        store
            .create_identity(new_identity("a@b.com"), Some(custom_link("1")))
            .await
            .unwrap();

        let claimed = store
            .claim_due_links(10, chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);

        // Leased entries are not due again until the lease expires
        let again = store
            .claim_due_links(10, chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_revoke_session_once() {
        let store = MemoryIdentityStore::new();
        let identity = store.create_identity(new_identity("a@b.com"), None).await.unwrap();
        let session_id = Uuid::new_v4();
        store.create_session(session_id, identity.id, "hash").await.unwrap();

        assert!(store.revoke_session(session_id).await.unwrap());
        assert!(!store.revoke_session(session_id).await.unwrap());

        let session = store.find_session(session_id).await.unwrap().unwrap();
        assert!(!session.is_active());
    }
}
