/// Auth proxy function
///
/// Forwards credentials to the backend auth service and reconciles the
/// result with the identity platform:
///
/// - `signup`: backend signup, then one store transaction creating the
///   identity (pre-confirmed), its profile and an SSO-link outbox entry
/// - `login`: backend login, then indexed identity lookup by email, then
///   a platform session
///
/// Nothing is retried here; the outbox entry is the only step that is
/// retried, by `ssobridge-worker`.
///
/// A backend-accepted signup whose identity write fails leaves the backend
/// user in place. The failure is logged with the backend user id so the
/// two systems can be reconciled by hand.

use ssobridge_shared::{
    auth::session::{SessionError, SessionIssuer},
    backend::{BackendAuth, BackendError, BackendLogin, BackendSignup},
    models::{
        identity::{normalize_email, CreateIdentity, IdentityMetadata, IdentityRecord},
        outbox::PendingSsoLink,
        sso_integration::CUSTOM_PROVIDER,
    },
    proxy::{LoginResponse, ProxyAction, ProxyRequest, SignupResponse, SIGNIN_ALIAS},
    store::{IdentityStore, StoreError},
};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

/// Proxy failures, one per step that can go wrong
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid action")]
    InvalidAction(String),

    #[error("Request validation failed")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Backend {} failed", .action.as_str())]
    Backend {
        action: ProxyAction,
        #[source]
        source: BackendError,
    },

    #[error("User already registered")]
    AlreadyRegistered(String),

    #[error("User creation failed")]
    IdentityCreation(#[source] StoreError),

    #[error("User not found")]
    UserNotFound,

    #[error("User lookup failed")]
    Lookup(#[source] StoreError),

    #[error("Session creation failed")]
    SessionIssue(#[source] SessionError),
}

/// Successful proxy reply
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProxyReply {
    Signup(SignupResponse),
    Login(LoginResponse),
}

/// Request handler behind the proxy endpoint
pub struct AuthProxy {
    backend: Arc<dyn BackendAuth>,
    store: Arc<dyn IdentityStore>,
    sessions: Arc<SessionIssuer>,
    provision_missing_identity: bool,
}

impl AuthProxy {
    pub fn new(
        backend: Arc<dyn BackendAuth>,
        store: Arc<dyn IdentityStore>,
        sessions: Arc<SessionIssuer>,
    ) -> Self {
        Self {
            backend,
            store,
            sessions,
            provision_missing_identity: false,
        }
    }

    /// Creates identities at login for emails the platform has never seen
    pub fn with_provision_missing_identity(mut self, enabled: bool) -> Self {
        self.provision_missing_identity = enabled;
        self
    }

    /// Dispatches a request by action
    ///
    /// An unknown action fails before any validation or network call.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyReply, ProxyError> {
        let action = ProxyAction::parse(&request.action)
            .ok_or_else(|| ProxyError::InvalidAction(request.action.clone()))?;

        if request.action == SIGNIN_ALIAS {
            tracing::warn!("Deprecated proxy action \"signin\"; use \"login\"");
        }

        request.validate()?;
        let email = normalize_email(&request.email).ok_or(ProxyError::InvalidEmail)?;

        match action {
            ProxyAction::Signup => {
                let signup =
                    BackendSignup::new(email, request.password, request.name, request.roles);
                self.signup(signup).await.map(ProxyReply::Signup)
            }
            ProxyAction::Login => {
                let login = BackendLogin {
                    email,
                    password: request.password,
                };
                self.login(login).await.map(ProxyReply::Login)
            }
        }
    }

    /// Registers with the backend and mirrors the user into the platform
    pub async fn signup(&self, signup: BackendSignup) -> Result<SignupResponse, ProxyError> {
        let backend_user = self
            .backend
            .signup(&signup)
            .await
            .map_err(|source| {
                tracing::warn!(
                    email = %signup.email,
                    upstream_status = ?source.status(),
                    error = %source,
                    "Backend signup failed"
                );
                ProxyError::Backend {
                    action: ProxyAction::Signup,
                    source,
                }
            })?;

        let roles = if backend_user.roles.is_empty() {
            signup.roles.clone()
        } else {
            backend_user.roles.clone()
        };

        let create = CreateIdentity {
            email: signup.email.clone(),
            metadata: IdentityMetadata {
                full_name: Some(signup.name.clone()),
                backend_user_id: Some(backend_user.id.clone()),
                roles,
            },
            email_confirmed: true,
        };
        let link = PendingSsoLink {
            provider: CUSTOM_PROVIDER.to_string(),
            external_user_id: backend_user.id.clone(),
        };

        let user = match self.store.create_identity(create, Some(link)).await {
            Ok(user) => user,
            Err(StoreError::EmailTaken(email)) => {
                tracing::error!(
                    backend_user_id = %backend_user.id,
                    %email,
                    "Backend accepted signup for an email that is already mirrored"
                );
                return Err(ProxyError::AlreadyRegistered(email));
            }
            Err(e) => {
                tracing::error!(
                    backend_user_id = %backend_user.id,
                    email = %signup.email,
                    error = %e,
                    "Identity creation failed after backend signup; backend user left in place"
                );
                return Err(ProxyError::IdentityCreation(e));
            }
        };

        tracing::info!(
            user_id = %user.id,
            backend_user_id = %backend_user.id,
            "Signup mirrored into identity platform"
        );

        Ok(SignupResponse {
            success: true,
            user,
            backend_user,
        })
    }

    /// Authenticates with the backend and issues a platform session
    pub async fn login(&self, login: BackendLogin) -> Result<LoginResponse, ProxyError> {
        let backend = self
            .backend
            .login(&login)
            .await
            .map_err(|source| {
                tracing::info!(
                    email = %login.email,
                    upstream_status = ?source.status(),
                    error = %source,
                    "Backend login failed"
                );
                ProxyError::Backend {
                    action: ProxyAction::Login,
                    source,
                }
            })?;

        let user = match self
            .store
            .find_identity_by_email(&login.email)
            .await
            .map_err(ProxyError::Lookup)?
        {
            Some(user) => user,
            None if self.provision_missing_identity => self.provision(&login.email).await?,
            None => {
                tracing::warn!(email = %login.email, "Backend accepted login but no identity exists");
                return Err(ProxyError::UserNotFound);
            }
        };

        let session = self
            .sessions
            .issue(self.store.as_ref(), &user)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Session issue failed");
                ProxyError::SessionIssue(e)
            })?;

        tracing::info!(user_id = %user.id, "Login succeeded");

        Ok(LoginResponse {
            success: true,
            backend_token: backend.access_token,
            session,
            user,
        })
    }

    async fn provision(&self, email: &str) -> Result<IdentityRecord, ProxyError> {
        let create = CreateIdentity {
            email: email.to_string(),
            metadata: IdentityMetadata::default(),
            email_confirmed: true,
        };

        match self.store.create_identity(create, None).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Provisioned identity at login");
                Ok(user)
            }
            // Lost a race with a concurrent login for the same email
            Err(StoreError::EmailTaken(_)) => self
                .store
                .find_identity_by_email(email)
                .await
                .map_err(ProxyError::Lookup)?
                .ok_or(ProxyError::UserNotFound),
            Err(e) => Err(ProxyError::IdentityCreation(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssobridge_shared::{backend::MemoryBackendAuth, store::MemoryIdentityStore};

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn proxy() -> (AuthProxy, Arc<MemoryBackendAuth>, Arc<MemoryIdentityStore>) {
        let backend = Arc::new(MemoryBackendAuth::new());
        let store = Arc::new(MemoryIdentityStore::new());
        let proxy = AuthProxy::new(
            backend.clone(),
            store.clone(),
            Arc::new(SessionIssuer::new(SECRET)),
        );
        (proxy, backend, store)
    }

    #[tokio::test]
    async fn test_invalid_action_makes_no_calls() {
        let (proxy, backend, _) = proxy();
        let mut request = ProxyRequest::login("a@b.com", "pw1");
        request.action = "transfer".to_string();

        let err = proxy.handle(request).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidAction(a) if a == "transfer"));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_signin_alias_logs_in() {
        let (proxy, _, _) = proxy();
        proxy
            .handle(ProxyRequest::signup("a@b.com", "pw1", None))
            .await
            .unwrap();

        let mut request = ProxyRequest::login("a@b.com", "pw1");
        request.action = "signin".to_string();
        assert!(matches!(
            proxy.handle(request).await.unwrap(),
            ProxyReply::Login(_)
        ));
    }

    #[tokio::test]
    async fn test_signup_normalizes_email_and_defaults_name() {
        let (proxy, _, store) = proxy();
        let reply = proxy
            .handle(ProxyRequest::signup("  A@B.com ", "pw1", None))
            .await
            .unwrap();

        let ProxyReply::Signup(signup) = reply else {
            panic!("expected signup reply");
        };
        assert_eq!(signup.user.email, "a@b.com");
        assert_eq!(signup.user.metadata.full_name.as_deref(), Some("User"));
        assert_eq!(signup.user.metadata.roles, vec!["user".to_string()]);
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_email_is_rejected_before_backend() {
        let (proxy, backend, _) = proxy();
        let err = proxy
            .handle(ProxyRequest::login("not-an-email", "pw1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProxyError::InvalidEmail));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_provisions_when_enabled() {
        let (proxy, backend, store) = proxy();
        let proxy = proxy.with_provision_missing_identity(true);

        backend
            .signup(&BackendSignup::new("a@b.com", "pw1", None, None))
            .await
            .unwrap();

        let reply = proxy
            .handle(ProxyRequest::login("a@b.com", "pw1"))
            .await
            .unwrap();
        let ProxyReply::Login(login) = reply else {
            panic!("expected login reply");
        };
        assert_eq!(login.user.metadata.backend_user_id, None);
        assert_eq!(store.identity_count().await, 1);
    }
}
