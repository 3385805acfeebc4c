/// Identity platform endpoints: refresh, logout, user, profile, authorize, health

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::TestContext;
use serde_json::{json, Value};
use ssobridge_shared::models::sso_integration::NewSsoIntegration;
use ssobridge_shared::store::IdentityStore;
use uuid::Uuid;

async fn logged_in(ctx: &TestContext) -> Value {
    ctx.signup("a@b.com", "pw1", Some("Ada Lovelace")).await;
    let (status, body) = ctx.login("a@b.com", "pw1").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn test_current_user_and_profile() {
    let ctx = TestContext::new();
    let login = logged_in(&ctx).await;
    let token = login["session"]["access_token"].as_str().unwrap();
    let user_id: Uuid = login["user"]["id"].as_str().unwrap().parse().unwrap();

    let (status, user) = ctx.get_authed("/v1/auth/user", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "a@b.com");

    ctx.store
        .insert_sso_integration(&NewSsoIntegration {
            user_id,
            provider: "custom".to_string(),
            external_user_id: "1".to_string(),
        })
        .await
        .unwrap();

    let (status, body) = ctx.get_authed("/v1/profile", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["full_name"], "Ada Lovelace");
    assert_eq!(body["sso_integrations"][0]["provider"], "custom");
}

#[tokio::test]
async fn test_missing_or_bad_bearer_is_rejected() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .uri("/v1/auth/user")
        .body(Body::empty())
        .unwrap();
    let (status, body) = common::into_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = ctx.get_authed("/v1/profile", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let ctx = TestContext::new();
    let login = logged_in(&ctx).await;
    let refresh_token = login["session"]["refresh_token"].as_str().unwrap();

    let (status, body) = ctx
        .post("/v1/auth/refresh", json!({"refresh_token": refresh_token}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);

    let (status, _) = ctx
        .get_authed("/v1/auth/user", body["access_token"].as_str().unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let ctx = TestContext::new();
    let login = logged_in(&ctx).await;
    let access = login["session"]["access_token"].as_str().unwrap();
    let refresh = login["session"]["refresh_token"].as_str().unwrap();

    assert_eq!(
        ctx.post_authed("/v1/auth/logout", access).await,
        StatusCode::NO_CONTENT
    );

    let (status, _) = ctx.get_authed("/v1/auth/user", access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .post("/v1/auth/refresh", json!({"refresh_token": refresh}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Logging out twice is rejected, not an error
    assert_eq!(
        ctx.post_authed("/v1/auth/logout", access).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_authorize_redirects_to_configured_provider() {
    let ctx = TestContext::with_config(common::test_config(&[
        ("OAUTH_PROVIDERS", "google"),
        ("OAUTH_GOOGLE_AUTHORIZE_URL", "https://accounts.example.com/o/auth"),
        ("OAUTH_GOOGLE_CLIENT_ID", "client-123"),
    ]));

    let request = Request::builder()
        .uri("/v1/auth/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A5173%2F")
        .body(Body::empty())
        .unwrap();
    let response = ctx.send(request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.example.com/o/auth?"));
    assert!(location.contains("client_id=client-123"));
    assert!(location.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5173%2F"));
}

#[tokio::test]
async fn test_authorize_rejects_custom_and_unknown_providers() {
    let ctx = TestContext::new();

    let request = Request::builder()
        .uri("/v1/auth/authorize?provider=custom")
        .body(Body::empty())
        .unwrap();
    let (status, body) = common::into_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Please use the sign in form for custom backend authentication."
    );

    let request = Request::builder()
        .uri("/v1/auth/authorize?provider=myspace")
        .body(Body::empty())
        .unwrap();
    let (status, _) = common::into_json(ctx.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = ctx.send(request).await;
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let (status, body) = common::into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
}
