//! Common test utilities for integration tests
//!
//! - In-process app wired to the in-memory store and backend
//! - Request helpers returning status and JSON body
//! - A fake backend auth service served over HTTP on an ephemeral port

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use ssobridge_api::app::{build_router, AppState};
use ssobridge_api::config::Config;
use ssobridge_shared::backend::{BackendAuth, MemoryBackendAuth};
use ssobridge_shared::store::{IdentityStore, MemoryIdentityStore};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Builds a config from the required test variables plus `extra`
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgresql://localhost/unused"),
        ("JWT_SECRET", JWT_SECRET),
        ("BACKEND_BASE_URL", "127.0.0.1:1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Test context containing the app and its in-memory collaborators
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryIdentityStore>,
    pub backend: Arc<MemoryBackendAuth>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryIdentityStore::new());
        let backend = Arc::new(MemoryBackendAuth::new());
        let app = build_app(store.clone(), backend.clone(), config);

        Self {
            app,
            store,
            backend,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn get_authed(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        into_json(self.send(request).await).await
    }

    pub async fn post_authed(&self, uri: &str, token: &str) -> StatusCode {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await.status()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Runs the proxy with `signup`
    pub async fn signup(&self, email: &str, password: &str, name: Option<&str>) -> (StatusCode, Value) {
        let mut body = json!({"action": "signup", "email": email, "password": password});
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        self.post("/functions/v1/custom-sso", body).await
    }

    /// Runs the proxy with `login`
    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/functions/v1/custom-sso",
            json!({"action": "login", "email": email, "password": password}),
        )
        .await
    }
}

pub fn build_app(
    store: Arc<dyn IdentityStore>,
    backend: Arc<dyn BackendAuth>,
    config: Config,
) -> Router {
    build_router(AppState::new(store, backend, config))
}

/// Splits a response into status and JSON body (Null when empty)
pub async fn into_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

/// Serves a fake backend auth service on an ephemeral port
///
/// Accepts any signup (answering a numeric id and extra fields) and
/// any login whose password is `pw1`; `boom@example.com` gets a 500.
pub async fn spawn_fake_backend() -> SocketAddr {
    async fn signup(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["email"] == "boom@example.com" {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "database down"})),
            );
        }
        (
            StatusCode::CREATED,
            Json(json!({
                "id": 42,
                "email": body["email"],
                "name": body["name"],
                "roles": body["roles"],
                "created_at": "2025-01-01T00:00:00Z"
            })),
        )
    }

    async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["password"] == "pw1" {
            (StatusCode::OK, Json(json!({"access_token": "backend-token-42"})))
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Invalid credentials"})),
            )
        }
    }

    let app = Router::new()
        .route("/users/signup", post(signup))
        .route("/auth/login", post(login));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
