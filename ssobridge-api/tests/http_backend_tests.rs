/// The reqwest backend client against a fake backend served over HTTP

mod common;

use axum::http::StatusCode;
use ssobridge_shared::backend::{
    BackendAuth, BackendError, BackendLogin, BackendSignup, HttpBackendAuth,
};
use ssobridge_shared::store::MemoryIdentityStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_signup_accepts_numeric_id_and_keeps_extra_fields() {
    let addr = common::spawn_fake_backend().await;
    // Scheme-less, the way the backend host is usually configured
    let client = HttpBackendAuth::new(&addr.to_string(), Some(Duration::from_secs(5))).unwrap();

    let user = client
        .signup(&BackendSignup::new("a@b.com", "pw1", None, None))
        .await
        .unwrap();

    assert_eq!(user.id, "42");
    assert_eq!(user.roles, vec!["user".to_string()]);
    assert_eq!(user.extra["name"], "User");
    assert_eq!(user.extra["created_at"], "2025-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_rejection_forwards_status_and_body() {
    let addr = common::spawn_fake_backend().await;
    let client = HttpBackendAuth::new(&format!("http://{}/", addr), None).unwrap();

    let err = client
        .login(&BackendLogin {
            email: "a@b.com".to_string(),
            password: "nope".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        BackendError::Rejected { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body["message"], "Invalid credentials");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpBackendAuth::new(&addr.to_string(), Some(Duration::from_secs(2))).unwrap();
    let err = client
        .signup(&BackendSignup::new("a@b.com", "pw1", None, None))
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn test_proxy_end_to_end_over_http_backend() {
    let addr = common::spawn_fake_backend().await;
    let backend = HttpBackendAuth::new(&addr.to_string(), None).unwrap();
    let store = Arc::new(MemoryIdentityStore::new());

    let ctx = common::TestContext {
        app: common::build_app(store.clone(), Arc::new(backend), common::test_config(&[])),
        store,
        backend: Arc::new(ssobridge_shared::backend::MemoryBackendAuth::new()),
    };

    let (status, body) = ctx.signup("a@b.com", "pw1", Some("A B")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["metadata"]["backend_user_id"], "42");
    assert_eq!(body["backend_user"]["created_at"], "2025-01-01T00:00:00Z");

    let (status, body) = ctx.login("a@b.com", "pw1").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["backend_token"], "backend-token-42");

    let (status, body) = ctx.signup("boom@example.com", "pw1", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["upstream"]["status"], 500);
    assert_eq!(body["upstream"]["body"]["message"], "database down");
}
