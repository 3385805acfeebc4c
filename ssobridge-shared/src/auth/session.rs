/// Platform session issuance
///
/// [`SessionIssuer`] turns an identity into a session: it records a session
/// row and signs an access/refresh token pair bound to that row. Refresh and
/// authentication both check the row, so revoking it ends the session
/// immediately.
///
/// # Example
///
/// ```
/// use ssobridge_shared::auth::session::SessionIssuer;
/// use ssobridge_shared::models::identity::{CreateIdentity, IdentityMetadata};
/// use ssobridge_shared::store::{IdentityStore, MemoryIdentityStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
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
/// let issuer = SessionIssuer::new("test-secret-key-at-least-32-bytes-long");
/// let tokens = issuer.issue(&store, &identity).await?;
/// let claims = issuer.authenticate(&store, &tokens.access_token).await?;
/// assert_eq!(claims.sub, identity.id);
/// # Ok(())
/// # }
/// ```

use crate::auth::jwt::{self, Claims, JwtError, TokenType};
use crate::auth::token::{hash_token, verify_token_hash};
use crate::models::identity::IdentityRecord;
use crate::store::{IdentityStore, StoreError};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token type reported to clients
pub const BEARER: &str = "bearer";

/// Access/refresh pair returned at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,
}

/// New access token returned by a refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub expires_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Jwt(#[from] JwtError),

    #[error("Session not found")]
    NotFound,

    #[error("Session has been revoked")]
    Revoked,

    #[error("Refresh token does not match session")]
    TokenMismatch,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Issues, refreshes, checks and revokes platform sessions
#[derive(Debug, Clone)]
pub struct SessionIssuer {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: TokenType::Access.default_expiration(),
            refresh_ttl: TokenType::Refresh.default_expiration(),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Creates a session row and signs its token pair
    pub async fn issue(
        &self,
        store: &dyn IdentityStore,
        identity: &IdentityRecord,
    ) -> Result<SessionTokens, SessionError> {
        let session_id = Uuid::new_v4();

        let refresh_claims = Claims::with_expiration(
            identity.id,
            session_id,
            &identity.email,
            TokenType::Refresh,
            self.refresh_ttl,
        );
        let refresh_token = jwt::create_token(&refresh_claims, &self.secret)?;

        store
            .create_session(session_id, identity.id, &hash_token(&refresh_token))
            .await?;

        let grant = self.sign_access(identity.id, session_id, &identity.email)?;

        tracing::debug!(user_id = %identity.id, session_id = %session_id, "Issued session");

        Ok(SessionTokens {
            access_token: grant.access_token,
            refresh_token,
            token_type: grant.token_type,
            expires_in: grant.expires_in,
            expires_at: grant.expires_at,
        })
    }

    /// Exchanges a refresh token for a new access token
    pub async fn refresh(
        &self,
        store: &dyn IdentityStore,
        refresh_token: &str,
    ) -> Result<AccessGrant, SessionError> {
        let claims = jwt::validate_refresh_token(refresh_token, &self.secret)?;

        let session = store
            .find_session(claims.sid)
            .await?
            .ok_or(SessionError::NotFound)?;

        if !session.is_active() {
            return Err(SessionError::Revoked);
        }
        if !verify_token_hash(refresh_token, &session.refresh_token_hash) {
            return Err(SessionError::TokenMismatch);
        }

        store.touch_session(session.id).await?;
        self.sign_access(claims.sub, claims.sid, &claims.email)
    }

    /// Validates an access token and checks its session is still active
    pub async fn authenticate(
        &self,
        store: &dyn IdentityStore,
        access_token: &str,
    ) -> Result<Claims, SessionError> {
        let claims = jwt::validate_access_token(access_token, &self.secret)?;

        match store.find_session(claims.sid).await? {
            Some(session) if session.is_active() => Ok(claims),
            Some(_) => Err(SessionError::Revoked),
            None => Err(SessionError::NotFound),
        }
    }

    /// Revokes the session behind `claims`
    pub async fn revoke(
        &self,
        store: &dyn IdentityStore,
        claims: &Claims,
    ) -> Result<bool, SessionError> {
        Ok(store.revoke_session(claims.sid).await?)
    }

    fn sign_access(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        email: &str,
    ) -> Result<AccessGrant, SessionError> {
        let claims =
            Claims::with_expiration(user_id, session_id, email, TokenType::Access, self.access_ttl);
        let access_token = jwt::create_token(&claims, &self.secret)?;

        Ok(AccessGrant {
            access_token,
            token_type: BEARER.to_string(),
            expires_in: self.access_ttl.num_seconds(),
            expires_at: claims.exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{CreateIdentity, IdentityMetadata};
    use crate::store::MemoryIdentityStore;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    async fn identity(store: &MemoryIdentityStore) -> IdentityRecord {
        store
            .create_identity(
                CreateIdentity {
                    email: "a@b.com".to_string(),
                    metadata: IdentityMetadata::default(),
                    email_confirmed: true,
                },
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_issue_and_refresh() {
        let store = MemoryIdentityStore::new();
        let identity = identity(&store).await;
        let issuer = SessionIssuer::new(SECRET);

        let tokens = issuer.issue(&store, &identity).await.unwrap();
        assert_eq!(tokens.token_type, "bearer");
        assert_eq!(tokens.expires_in, 3600);

        let grant = issuer.refresh(&store, &tokens.refresh_token).await.unwrap();
        let claims = issuer.authenticate(&store, &grant.access_token).await.unwrap();
        assert_eq!(claims.sub, identity.id);
        assert_eq!(claims.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_revoked_session_cannot_refresh_or_authenticate() {
        let store = MemoryIdentityStore::new();
        let identity = identity(&store).await;
        let issuer = SessionIssuer::new(SECRET);

        let tokens = issuer.issue(&store, &identity).await.unwrap();
        let claims = issuer.authenticate(&store, &tokens.access_token).await.unwrap();
        assert!(issuer.revoke(&store, &claims).await.unwrap());

        assert!(matches!(
            issuer.refresh(&store, &tokens.refresh_token).await,
            Err(SessionError::Revoked)
        ));
        assert!(matches!(
            issuer.authenticate(&store, &tokens.access_token).await,
            Err(SessionError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_access_token_is_not_a_refresh_token() {
        let store = MemoryIdentityStore::new();
        let identity = identity(&store).await;
        let issuer = SessionIssuer::new(SECRET);

        let tokens = issuer.issue(&store, &identity).await.unwrap();
        let result = issuer.refresh(&store, &tokens.access_token).await;
        assert!(matches!(
            result,
            Err(SessionError::Jwt(JwtError::WrongTokenType { .. }))
        ));
    }
}
