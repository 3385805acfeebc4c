//! Common test utilities for client integration tests
//!
//! - `FakeProxy` and `FakePlatform`: scriptable in-memory collaborators
//! - `start_context`: a started context over the fakes
//! - `spawn_server`: the real API router on an ephemeral port

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use ssobridge_api::app::{build_router, AppState};
use ssobridge_api::config::Config;
use ssobridge_client::{
    AuthEvent, ClientError, ContextOptions, IdentityPlatform, MemoryTokenStorage, Notification,
    ProxyClient, Session, SessionContext,
};
use ssobridge_shared::{
    auth::session::SessionTokens,
    backend::{BackendUser, MemoryBackendAuth},
    models::identity::{IdentityMetadata, IdentityRecord},
    platform::ProfileResponse,
    proxy::{LoginResponse, ProxyRequest, SignupResponse},
    store::MemoryIdentityStore,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";
pub const BACKEND_TOKEN: &str = "backend-token-1";
pub const AUTHORIZE_URL: &str = "https://accounts.example.com/o/oauth2/auth";

pub fn identity(email: &str) -> IdentityRecord {
    let now = Utc::now();
    IdentityRecord {
        id: uuid::Uuid::new_v4(),
        email: email.to_string(),
        metadata: IdentityMetadata {
            full_name: Some("A B".to_string()),
            backend_user_id: Some("1".to_string()),
            roles: vec!["user".to_string()],
        },
        email_confirmed_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}

pub fn tokens(access_token: &str, expires_in: i64) -> SessionTokens {
    SessionTokens {
        access_token: access_token.to_string(),
        refresh_token: format!("{}-refresh", access_token),
        token_type: "bearer".to_string(),
        expires_in,
        expires_at: Utc::now().timestamp() + expires_in,
    }
}

pub fn session(email: &str, expires_in: i64) -> Session {
    Session::from_tokens(tokens("access-0", expires_in), identity(email))
}

/// Proxy that answers from memory and records every request
#[derive(Default)]
pub struct FakeProxy {
    pub requests: Mutex<Vec<ProxyRequest>>,
    pub reject_with: Mutex<Option<ClientError>>,
}

impl FakeProxy {
    pub fn reject(&self, status: u16, message: &str) {
        *self.reject_with.lock().unwrap() = Some(ClientError::Proxy {
            status,
            message: message.to_string(),
            code: Some("backend_error".to_string()),
        });
    }

    pub fn requests(&self) -> Vec<ProxyRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &ProxyRequest) -> Result<(), ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.reject_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProxyClient for FakeProxy {
    async fn signup(&self, request: &ProxyRequest) -> Result<SignupResponse, ClientError> {
        self.record(request)?;
        Ok(SignupResponse {
            success: true,
            user: identity(&request.email),
            backend_user: BackendUser {
                id: "1".to_string(),
                email: Some(request.email.clone()),
                roles: vec!["user".to_string()],
                extra: serde_json::Map::new(),
            },
        })
    }

    async fn login(&self, request: &ProxyRequest) -> Result<LoginResponse, ClientError> {
        self.record(request)?;
        Ok(LoginResponse {
            success: true,
            backend_token: BACKEND_TOKEN.to_string(),
            session: tokens("access-1", 3600),
            user: identity(&request.email),
        })
    }
}

/// Platform that keeps its session in memory and emits real events
pub struct FakePlatform {
    events: broadcast::Sender<AuthEvent>,
    current: Mutex<Option<Session>>,
    pub fail_set_session: AtomicBool,
    pub fail_sign_out: AtomicBool,
    /// Platform treats the session as revoked on refresh and profile
    pub revoked: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub authorize_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            current: Mutex::new(None),
            fail_set_session: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            revoked: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
        }
    }

    /// Platform that already holds a persisted session
    pub fn with_session(session: Session) -> Self {
        let platform = Self::new();
        *platform.current.lock().unwrap() = Some(session);
        platform
    }

    /// Emits an event as if the platform changed the session itself
    pub fn emit(&self, event: AuthEvent) {
        if let AuthEvent::SignedOut = event {
            *self.current.lock().unwrap() = None;
        }
        let _ = self.events.send(event);
    }

    fn check_revoked(&self) -> Result<(), ClientError> {
        if !self.revoked.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.emit(AuthEvent::SignedOut);
        Err(ClientError::Platform {
            status: 401,
            message: "Session has been revoked".to_string(),
        })
    }
}

#[async_trait]
impl IdentityPlatform for FakePlatform {
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        Ok(self.current.lock().unwrap().clone())
    }

    async fn set_session(&self, tokens: &SessionTokens) -> Result<Session, ClientError> {
        if self.fail_set_session.load(Ordering::SeqCst) {
            return Err(ClientError::Platform {
                status: 401,
                message: "Invalid token".to_string(),
            });
        }

        let session = Session::from_tokens(tokens.clone(), identity("a@b.com"));
        *self.current.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session, ClientError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_revoked()?;
        let mut session = self
            .current
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::NotAuthenticated)?;

        session.access_token = format!("refreshed-{}", n);
        session.expires_at = Utc::now().timestamp() + 3600;
        *self.current.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap() = None;
        let _ = self.events.send(AuthEvent::SignedOut);

        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(ClientError::Platform {
                status: 503,
                message: "Platform unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, ClientError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        match provider {
            "google" => Ok(format!(
                "{}?client_id=abc&redirect_uri={}",
                AUTHORIZE_URL,
                redirect_to.unwrap_or_default()
            )),
            other => Err(ClientError::Platform {
                status: 400,
                message: format!("Unsupported provider: {}", other),
            }),
        }
    }

    async fn profile(&self) -> Result<ProfileResponse, ClientError> {
        self.check_revoked()?;
        Ok(ProfileResponse {
            profile: None,
            sso_integrations: Vec::new(),
        })
    }
}

/// Context over the fakes
pub struct TestContext {
    pub context: SessionContext,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
    pub proxy: Arc<FakeProxy>,
    pub platform: Arc<FakePlatform>,
    pub storage: Arc<MemoryTokenStorage>,
}

impl TestContext {
    /// Drains pending notifications
    pub fn notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

pub async fn start_context(platform: FakePlatform, options: ContextOptions) -> TestContext {
    let proxy = Arc::new(FakeProxy::default());
    let platform = Arc::new(platform);
    let storage = Arc::new(MemoryTokenStorage::new());

    let (context, notifications) =
        SessionContext::start(proxy.clone(), platform.clone(), storage.clone(), options).await;

    TestContext {
        context,
        notifications,
        proxy,
        platform,
        storage,
    }
}

/// Serves the API router, wired to in-memory collaborators, on an
/// ephemeral port
pub async fn spawn_server() -> (SocketAddr, Arc<MemoryIdentityStore>) {
    let vars: HashMap<&str, &str> = [
        ("DATABASE_URL", "postgresql://localhost/unused"),
        ("JWT_SECRET", JWT_SECRET),
        ("BACKEND_BASE_URL", "127.0.0.1:1"),
        ("OAUTH_PROVIDERS", "google"),
        ("OAUTH_GOOGLE_AUTHORIZE_URL", AUTHORIZE_URL),
        ("OAUTH_GOOGLE_CLIENT_ID", "client-123"),
    ]
    .into_iter()
    .collect();
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("valid test config");

    let store = Arc::new(MemoryIdentityStore::new());
    let backend = Arc::new(MemoryBackendAuth::new());
    let app = build_router(AppState::new(store.clone(), backend, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, store)
}
