/// Profile viewer endpoint
///
/// ```text
/// GET /v1/profile
/// Authorization: Bearer <access token>
/// ```
///
/// Returns the profile row and SSO integrations of the bearer's user.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use ssobridge_shared::{auth::jwt::Claims, platform::ProfileResponse};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.store.find_profile(claims.sub).await?;
    let sso_integrations = state.store.list_sso_integrations(claims.sub).await?;

    Ok(Json(ProfileResponse {
        profile,
        sso_integrations,
    }))
}
