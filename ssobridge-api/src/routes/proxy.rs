/// Auth proxy endpoint
///
/// # Endpoint
///
/// ```text
/// POST /functions/v1/custom-sso
/// POST /v1/proxy
/// Content-Type: application/json
///
/// { "action": "login", "email": "a@b.com", "password": "pw1" }
/// ```
///
/// # Response
///
/// Signup:
///
/// ```json
/// { "success": true, "user": { "id": "uuid", ... }, "backend_user": { "id": "42", ... } }
/// ```
///
/// Login:
///
/// ```json
/// {
///   "success": true,
///   "backend_token": "...",
///   "session": { "access_token": "eyJ...", "refresh_token": "eyJ...", ... },
///   "user": { "id": "uuid", ... }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Unknown action (`"Invalid action"`) or unreadable body
/// - `4xx`: Backend rejected the credentials; upstream status and body forwarded
/// - `404 Not Found`: Backend accepted the login but no identity exists
/// - `409 Conflict`: Email already mirrored
/// - `422 Unprocessable Entity`: Validation failed
/// - `500 Internal Server Error`: Identity or session write failed
/// - `502 Bad Gateway`: Backend unreachable or answered 5xx

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    proxy::ProxyReply,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use ssobridge_shared::proxy::ProxyRequest;

pub async fn custom_sso(
    State(state): State<AppState>,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> ApiResult<Json<ProxyReply>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let reply = state.proxy.handle(request).await?;
    Ok(Json(reply))
}
