/// Identity platform client
///
/// Holds the current platform session, persists it under
/// [`SESSION_KEY`](crate::storage::SESSION_KEY) and broadcasts an
/// [`AuthEvent`] whenever it changes.

use crate::error::ClientError;
use crate::storage::{TokenStorage, SESSION_KEY};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use ssobridge_shared::{
    auth::session::{AccessGrant, SessionTokens},
    models::identity::IdentityRecord,
    platform::{
        ProfileResponse, RefreshRequest, AUTHORIZE_PATH, LOGOUT_PATH, PROFILE_PATH,
        REFRESH_PATH, USER_PATH,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

const EVENT_CAPACITY: usize = 16;

/// Platform session as seen by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,

    /// Access token expiry (Unix timestamp)
    pub expires_at: i64,

    pub user: IdentityRecord,
}

impl Session {
    pub fn from_tokens(tokens: SessionTokens, user: IdentityRecord) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            expires_at: tokens.expires_at,
            user,
        }
    }

    /// Replaces the access token with a refreshed one
    pub fn apply_grant(&mut self, grant: AccessGrant) {
        self.access_token = grant.access_token;
        self.token_type = grant.token_type;
        self.expires_in = grant.expires_in;
        self.expires_at = grant.expires_at;
    }

    /// Whether the access token expires within `margin` from now
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        self.expires_at <= (Utc::now() + margin).timestamp()
    }
}

/// Session change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Session operations of the identity platform
#[async_trait]
pub trait IdentityPlatform: Send + Sync {
    /// Subscribes to session changes
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Returns the current or persisted session
    async fn get_session(&self) -> Result<Option<Session>, ClientError>;

    /// Establishes a session from tokens issued at login
    async fn set_session(&self, tokens: &SessionTokens) -> Result<Session, ClientError>;

    /// Exchanges the refresh token for a new access token
    ///
    /// A rejected refresh token drops the session and emits
    /// [`AuthEvent::SignedOut`].
    async fn refresh_session(&self) -> Result<Session, ClientError>;

    /// Invalidates the session
    ///
    /// The local session is dropped even when the platform call fails.
    async fn sign_out(&self) -> Result<(), ClientError>;

    /// Resolves the federated sign-in URL for `provider`
    async fn authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, ClientError>;

    /// Profile and SSO integrations of the signed-in user
    async fn profile(&self) -> Result<ProfileResponse, ClientError>;
}

/// [`IdentityPlatform`] over HTTP
pub struct HttpPlatform {
    client: reqwest::Client,
    base_url: String,
    storage: Arc<dyn TokenStorage>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl HttpPlatform {
    pub fn new(
        base_url: &str,
        storage: Arc<dyn TokenStorage>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        // Authorize answers with a redirect that the caller follows, not us
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
            current: RwLock::new(None),
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn current_session(&self) -> Result<Session, ClientError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn store_session(&self, session: &Session) -> Result<(), ClientError> {
        let json =
            serde_json::to_string(session).map_err(|e| ClientError::Storage(e.to_string()))?;
        self.storage.set(SESSION_KEY, &json).await?;
        *self.current.write().await = Some(session.clone());
        Ok(())
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Drops a session the platform no longer accepts
    async fn invalidate(&self) {
        *self.current.write().await = None;
        if let Err(e) = self.storage.remove(SESSION_KEY).await {
            tracing::warn!(error = %e, "Failed to clear invalidated session");
        }
        self.emit(AuthEvent::SignedOut);
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, ClientError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(ClientError::platform(status.as_u16(), &body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdentityPlatform for HttpPlatform {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        if let Some(session) = self.current.read().await.clone() {
            return Ok(Some(session));
        }

        let Some(json) = self.storage.get(SESSION_KEY).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&json) {
            Ok(session) => {
                *self.current.write().await = Some(session.clone());
                Ok(Some(session))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                self.storage.remove(SESSION_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn set_session(&self, tokens: &SessionTokens) -> Result<Session, ClientError> {
        let user: IdentityRecord = self.get_json(USER_PATH, &tokens.access_token).await?;
        let session = Session::from_tokens(tokens.clone(), user);

        self.store_session(&session).await?;
        tracing::info!(user_id = %session.user.id, "Platform session established");

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session, ClientError> {
        let mut session = self.current_session().await?;

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest {
                refresh_token: session.refresh_token.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            let err = ClientError::platform(status.as_u16(), &body);
            if err.is_unauthorized() {
                tracing::info!(user_id = %session.user.id, error = %err, "Refresh token rejected; session dropped");
                self.invalidate().await;
            }
            return Err(err);
        }

        let grant: AccessGrant = response.json().await?;
        session.apply_grant(grant);
        self.store_session(&session).await?;

        tracing::debug!(user_id = %session.user.id, expires_at = session.expires_at, "Session refreshed");
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let session = self.current.write().await.take();
        let cleared = self.storage.remove(SESSION_KEY).await;
        self.emit(AuthEvent::SignedOut);
        cleared?;

        let Some(session) = session else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(ClientError::platform(status.as_u16(), &body));
        }

        tracing::info!(user_id = %session.user.id, "Signed out");
        Ok(())
    }

    async fn authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut query = vec![("provider", provider)];
        if let Some(redirect_to) = redirect_to {
            query.push(("redirect_to", redirect_to));
        }

        let response = self
            .client
            .get(self.url(AUTHORIZE_PATH))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status.is_redirection() {
            return response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| ClientError::Decode("Redirect without a location".to_string()));
        }

        let body = response.bytes().await?;
        Err(ClientError::platform(status.as_u16(), &body))
    }

    async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        let session = self.current_session().await?;
        let result = self.get_json(PROFILE_PATH, &session.access_token).await;
        if matches!(&result, Err(e) if e.is_unauthorized()) {
            tracing::info!(user_id = %session.user.id, "Access token rejected; session dropped");
            self.invalidate().await;
        }
        result
    }
}
