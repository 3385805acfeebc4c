/// Platform session endpoints
///
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token
/// - `GET  /v1/auth/authorize` - Redirect to a federated provider
/// - `POST /v1/auth/logout` - Revoke the current session (bearer)
/// - `GET  /v1/auth/user` - Identity of the current session (bearer)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use ssobridge_shared::{
    auth::{jwt::Claims, session::AccessGrant},
    models::{identity::IdentityRecord, sso_integration::CUSTOM_PROVIDER},
    platform::{AuthorizeQuery, RefreshRequest, CUSTOM_PROVIDER_HINT},
};

/// Refresh token endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/refresh
/// Content-Type: application/json
///
/// { "refresh_token": "eyJ..." }
/// ```
///
/// # Response
///
/// ```json
/// { "access_token": "eyJ...", "token_type": "bearer", "expires_in": 3600, "expires_at": 1700000000 }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired or revoked refresh token
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<AccessGrant>> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let grant = state
        .sessions
        .refresh(state.store.as_ref(), &req.refresh_token)
        .await?;

    Ok(Json(grant))
}

/// Logout endpoint; revokes the bearer's session
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    state.sessions.revoke(state.store.as_ref(), &claims).await?;

    tracing::info!(user_id = %claims.sub, session_id = %claims.sid, "Session revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Current user endpoint
pub async fn current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<IdentityRecord>> {
    let user = state
        .store
        .find_identity_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Federated sign-in redirect
///
/// Answers `302 Found` with the provider's authorize URL, carrying the
/// configured client id and the caller's `redirect_to`.
///
/// # Errors
///
/// - `400 Bad Request`: Provider is `custom` or not configured
pub async fn authorize(
    State(state): State<AppState>,
    query: Result<Query<AuthorizeQuery>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let provider = query.provider.trim().to_ascii_lowercase();

    if provider == CUSTOM_PROVIDER {
        return Err(ApiError::BadRequest(CUSTOM_PROVIDER_HINT.to_string()));
    }

    let config = state
        .config
        .oauth
        .providers
        .get(&provider)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported provider: {}", provider)))?;

    let mut params = vec![
        ("client_id", config.client_id.as_str()),
        ("response_type", "code"),
    ];
    if let Some(redirect_to) = query.redirect_to.as_deref() {
        params.push(("redirect_uri", redirect_to));
    }

    let url = reqwest::Url::parse_with_params(&config.authorize_url, &params).map_err(|e| {
        ApiError::InternalError(format!("Invalid authorize URL for {}: {}", provider, e))
    })?;

    tracing::debug!(%provider, "Redirecting to federated provider");
    Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
}
