/// Session context
///
/// [`SessionContext`] owns the client's authentication state. It is created
/// with [`SessionContext::start`], which subscribes to platform session
/// events before loading any persisted session, and torn down with
/// [`SessionContext::shutdown`]. Views borrow the state through a
/// `tokio::sync::watch` receiver.
///
/// # Phases
///
/// ```text
/// Unknown --start--> Loading --first session resolution--> Authenticated | Anonymous
/// ```
///
/// Both the event listener and the initial fetch go through
/// `apply_session`, so `loading` drops to false as soon as either one has
/// resolved. Concurrent operations are not serialized; the last session
/// applied wins.
///
/// # Example
///
/// ```no_run
/// use ssobridge_client::{ClientConfig, SessionContext};
///
/// # async fn example() -> Result<(), ssobridge_client::ClientError> {
/// let config = ClientConfig::new("http://localhost:8080");
/// let (context, mut notifications) = SessionContext::connect(&config).await?;
///
/// context.sign_in("a@b.com", "pw1").await?;
/// assert!(context.state().is_authenticated());
///
/// while let Ok(notification) = notifications.try_recv() {
///     println!("{}: {}", notification.title, notification.description);
/// }
///
/// context.shutdown().await;
/// # Ok(())
/// # }
/// ```

use crate::config::{ClientConfig, DEFAULT_REFRESH_MARGIN};
use crate::error::ClientError;
use crate::notify::{self, Notification, Notifier};
use crate::platform::{AuthEvent, HttpPlatform, IdentityPlatform, Session};
use crate::proxy::{HttpProxyClient, ProxyClient};
use crate::storage::{TokenStorage, BACKEND_TOKEN_KEY};
use chrono::Utc;
use ssobridge_shared::{
    backend::DEFAULT_NAME,
    models::{identity::IdentityRecord, sso_integration::CUSTOM_PROVIDER},
    platform::{ProfileResponse, CUSTOM_PROVIDER_HINT},
    proxy::{ProxyRequest, SignupResponse},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    /// Context not started
    #[default]
    Unknown,
    /// Waiting for the first session resolution
    Loading,
    Authenticated,
    Anonymous,
}

/// Authentication state observed by views
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub user: Option<IdentityRecord>,
    pub session: Option<Session>,
    pub loading: bool,
    pub phase: AuthPhase,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
            phase: AuthPhase::Unknown,
        }
    }
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }
}

/// Behaviour switches for a [`SessionContext`]
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub auto_refresh: bool,
    pub refresh_margin: Duration,
    pub sso_redirect_to: Option<String>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            auto_refresh: false,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            sso_redirect_to: None,
        }
    }
}

impl From<&ClientConfig> for ContextOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            auto_refresh: config.auto_refresh,
            refresh_margin: config.refresh_margin,
            sso_redirect_to: config.sso_redirect_to.clone(),
        }
    }
}

/// Owned authentication state plus the operations that change it
pub struct SessionContext {
    proxy: Arc<dyn ProxyClient>,
    platform: Arc<dyn IdentityPlatform>,
    storage: Arc<dyn TokenStorage>,
    state: Arc<watch::Sender<AuthState>>,
    notifier: Notifier,
    options: ContextOptions,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionContext {
    /// Starts a context over HTTP clients built from `config`
    pub async fn connect(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notification>), ClientError> {
        let storage = config.storage()?;
        let proxy = Arc::new(HttpProxyClient::new(config.proxy_url.clone(), config.timeout)?);
        let platform = Arc::new(HttpPlatform::new(
            &config.platform_url,
            storage.clone(),
            config.timeout,
        )?);

        Ok(Self::start(proxy, platform, storage, ContextOptions::from(config)).await)
    }

    /// Subscribes to session events, then resolves the persisted session
    ///
    /// Returns the context and the receiving end of its notifications.
    pub async fn start(
        proxy: Arc<dyn ProxyClient>,
        platform: Arc<dyn IdentityPlatform>,
        storage: Arc<dyn TokenStorage>,
        options: ContextOptions,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notifier, notifications) = Notifier::channel();
        let state = Arc::new(watch::Sender::new(AuthState::default()));
        let cancel = CancellationToken::new();

        state.send_modify(|s| s.phase = AuthPhase::Loading);

        let mut tasks = vec![tokio::spawn(listen(
            platform.subscribe(),
            state.clone(),
            cancel.clone(),
        ))];

        let initial = match platform.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted session");
                None
            }
        };
        let initial = match initial {
            Some(session) if session.expires_within(chrono::Duration::zero()) => {
                match platform.refresh_session().await {
                    Ok(session) => Some(session),
                    Err(e) => {
                        tracing::warn!(error = %e, "Persisted session expired and could not be refreshed");
                        None
                    }
                }
            }
            other => other,
        };
        apply_session(&state, initial);

        if options.auto_refresh {
            tasks.push(tokio::spawn(auto_refresh(
                platform.clone(),
                state.clone(),
                options.refresh_margin,
                cancel.clone(),
            )));
        }

        let context = Self {
            proxy,
            platform,
            storage,
            state,
            notifier,
            options,
            cancel,
            tasks,
        };
        (context, notifications)
    }

    /// Current state snapshot
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Creates a backend account through the proxy
    ///
    /// `name` defaults to "User". Does not sign in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<SignupResponse, ClientError> {
        let name = name.filter(|n| !n.trim().is_empty()).unwrap_or(DEFAULT_NAME);
        let request = ProxyRequest::signup(email, password, Some(name.to_string()));

        match self.proxy.signup(&request).await {
            Ok(response) => {
                self.notifier.send(Notification::info(
                    notify::SIGNUP_SUCCESS,
                    "Account created successfully! You can now sign in.",
                ));
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Signup failed");
                self.notifier
                    .send(Notification::destructive(notify::SIGNUP_ERROR, e.to_string()));
                Err(e)
            }
        }
    }

    /// Signs in through the proxy and establishes the platform session
    ///
    /// The backend token is persisted before the platform session is set up
    /// and is kept if that second step fails.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response = match self.proxy.login(&ProxyRequest::login(email, password)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.notifier
                    .send(Notification::destructive(notify::LOGIN_ERROR, e.to_string()));
                return Err(e);
            }
        };

        if let Err(e) = self
            .storage
            .set(BACKEND_TOKEN_KEY, &response.backend_token)
            .await
        {
            tracing::warn!(error = %e, "Failed to persist backend token");
        }

        let session = match self.platform.set_session(&response.session).await {
            Ok(session) => session,
            Err(e) => {
                let err = ClientError::SessionEstablishment(e.to_string());
                tracing::error!(error = %e, user_id = %response.user.id, "Session establishment failed");
                self.notifier
                    .send(Notification::destructive(notify::LOGIN_ERROR, err.to_string()));
                return Err(err);
            }
        };

        apply_session(&self.state, Some(session.clone()));
        self.notifier.send(Notification::info(
            notify::LOGIN_SUCCESS,
            "You have successfully logged in.",
        ));
        Ok(session)
    }

    /// Signs out; always ends Anonymous
    ///
    /// A failed platform sign-out is notified but local state is cleared
    /// regardless.
    pub async fn sign_out(&self) {
        if let Err(e) = self.storage.remove(BACKEND_TOKEN_KEY).await {
            tracing::warn!(error = %e, "Failed to clear backend token");
        }

        let result = self.platform.sign_out().await;
        apply_session(&self.state, None);

        match result {
            Ok(()) => self.notifier.send(Notification::info(
                notify::LOGOUT_SUCCESS,
                "You have been successfully logged out.",
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Platform sign-out failed");
                self.notifier
                    .send(Notification::destructive(notify::LOGOUT_ERROR, e.to_string()));
            }
        }
    }

    /// Starts federated sign-in
    ///
    /// Returns the URL to send the user to, or None for the `custom`
    /// provider, which signs in through the credential form instead. The
    /// resulting session arrives through the platform's session events.
    pub async fn sign_in_with_sso(&self, provider: &str) -> Result<Option<String>, ClientError> {
        if provider.trim().eq_ignore_ascii_case(CUSTOM_PROVIDER) {
            self.notifier
                .send(Notification::info(notify::CUSTOM_SSO, CUSTOM_PROVIDER_HINT));
            return Ok(None);
        }

        match self
            .platform
            .authorize_url(provider, self.options.sso_redirect_to.as_deref())
            .await
        {
            Ok(url) => Ok(Some(url)),
            Err(e) => {
                tracing::warn!(error = %e, %provider, "Federated sign-in failed");
                self.notifier
                    .send(Notification::destructive(notify::SSO_ERROR, e.to_string()));
                Err(e)
            }
        }
    }

    /// Exchanges the refresh token for a new access token
    ///
    /// A rejected refresh token ends the session.
    pub async fn refresh(&self) -> Result<Session, ClientError> {
        match self.platform.refresh_session().await {
            Ok(session) => {
                apply_session(&self.state, Some(session.clone()));
                Ok(session)
            }
            Err(e) => Err(self.drop_if_unauthorized(e)),
        }
    }

    /// Profile and SSO integrations of the signed-in user
    pub async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        if !self.state.borrow().is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        self.platform
            .profile()
            .await
            .map_err(|e| self.drop_if_unauthorized(e))
    }

    fn drop_if_unauthorized(&self, err: ClientError) -> ClientError {
        if err.is_unauthorized() {
            apply_session(&self.state, None);
        }
        err
    }

    /// Persisted backend token, if any
    pub async fn backend_token(&self) -> Result<Option<String>, ClientError> {
        self.storage.get(BACKEND_TOKEN_KEY).await
    }

    /// Stops the event listener and the refresh task
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session task ended abnormally");
            }
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Folds a resolved session (or its absence) into the state
fn apply_session(state: &watch::Sender<AuthState>, session: Option<Session>) {
    state.send_modify(|s| {
        s.user = session.as_ref().map(|session| session.user.clone());
        s.phase = if session.is_some() {
            AuthPhase::Authenticated
        } else {
            AuthPhase::Anonymous
        };
        s.session = session;
        s.loading = false;
    });
}

async fn listen(
    mut events: broadcast::Receiver<AuthEvent>,
    state: Arc<watch::Sender<AuthState>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(AuthEvent::SignedIn(session)) | Ok(AuthEvent::TokenRefreshed(session)) => {
                    apply_session(&state, Some(session));
                }
                Ok(AuthEvent::SignedOut) => apply_session(&state, None),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!("Session listener stopped");
}

async fn auto_refresh(
    platform: Arc<dyn IdentityPlatform>,
    state: Arc<watch::Sender<AuthState>>,
    margin: Duration,
    cancel: CancellationToken,
) {
    let mut changes = state.subscribe();

    loop {
        let expires_at = changes
            .borrow_and_update()
            .session
            .as_ref()
            .map(|s| s.expires_at);

        match expires_at {
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
            Some(expires_at) => {
                let delay = refresh_delay(expires_at, margin, Utc::now().timestamp());
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(delay) => {
                        match platform.refresh_session().await {
                            Ok(session) => apply_session(&state, Some(session)),
                            Err(e) if e.is_unauthorized() => {
                                tracing::info!(error = %e, "Session rejected during automatic refresh");
                                apply_session(&state, None);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Automatic session refresh failed");
                                // Retry only once the session changes
                                tokio::select! {
                                    _ = cancel.cancelled() => return,
                                    changed = changes.changed() => {
                                        if changed.is_err() {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Time until a token expiring at `expires_at` is due for refresh
fn refresh_delay(expires_at: i64, margin: Duration, now: i64) -> Duration {
    let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
    let secs = expires_at.saturating_sub(margin).saturating_sub(now);
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}
