/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use ssobridge_api::{app::AppState, config::Config};
/// use ssobridge_shared::{
///     backend::HttpBackendAuth,
///     db::pool::{create_pool, DatabaseConfig},
///     store::PgIdentityStore,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let backend = HttpBackendAuth::new(&config.backend.base_url, config.backend.timeout())?;
/// let state = AppState::new(Arc::new(PgIdentityStore::new(pool)), Arc::new(backend), config);
/// let app = ssobridge_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::security::SecurityHeadersLayer,
    proxy::AuthProxy,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use ssobridge_shared::{
    auth::session::SessionIssuer,
    backend::BackendAuth,
    platform::{AUTHORIZE_PATH, LOGOUT_PATH, PROFILE_PATH, REFRESH_PATH, USER_PATH},
    proxy::{PROXY_ALIAS_PATH, PROXY_PATH},
    store::IdentityStore,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Identity platform storage
    pub store: Arc<dyn IdentityStore>,

    /// Signup/login orchestration
    pub proxy: Arc<AuthProxy>,

    /// Platform session issuance
    pub sessions: Arc<SessionIssuer>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        store: Arc<dyn IdentityStore>,
        backend: Arc<dyn BackendAuth>,
        config: Config,
    ) -> Self {
        let sessions = Arc::new(
            SessionIssuer::new(config.jwt.secret.clone())
                .with_access_ttl(chrono::Duration::seconds(config.jwt.access_token_ttl_secs)),
        );

        let proxy = Arc::new(
            AuthProxy::new(backend, store.clone(), sessions.clone())
                .with_provision_missing_identity(config.proxy.provision_missing_identity),
        );

        Self {
            store,
            proxy,
            sessions,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                         # Health check (public)
/// ├── /functions/v1/custom-sso        # Auth proxy (public)
/// ├── /v1/
/// │   ├── POST /proxy                 # Auth proxy alias (public)
/// │   ├── /auth/
/// │   │   ├── POST /refresh           # public, takes a refresh token
/// │   │   ├── GET  /authorize         # public, federated redirect
/// │   │   ├── POST /logout            # bearer
/// │   │   └── GET  /user              # bearer
/// │   └── GET /profile                # bearer
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer; pre-flight answered with an empty body)
/// 3. Security headers
/// 4. Bearer session authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(PROXY_PATH, post(routes::proxy::custom_sso))
        .route(PROXY_ALIAS_PATH, post(routes::proxy::custom_sso))
        .route(REFRESH_PATH, post(routes::auth::refresh))
        .route(AUTHORIZE_PATH, get(routes::auth::authorize));

    let session_routes = Router::new()
        .route(LOGOUT_PATH, post(routes::auth::logout))
        .route(USER_PATH, get(routes::auth::current_user))
        .route(PROFILE_PATH, get(routes::profile::get_profile))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_auth_layer,
        ));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::HeaderName::from_static("apikey"),
                header::HeaderName::from_static("x-client-info"),
            ])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer session authentication middleware
///
/// Validates the access token, checks its session has not been revoked,
/// and injects the token [`Claims`](ssobridge_shared::auth::jwt::Claims)
/// into request extensions.
async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = state
        .sessions
        .authenticate(state.store.as_ref(), token)
        .await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
