/// Identity platform wire types
///
/// Bodies of the `/v1/auth/*` and `/v1/profile` endpoints.

use crate::models::{profile::Profile, sso_integration::SsoIntegration};
use serde::{Deserialize, Serialize};

pub const REFRESH_PATH: &str = "/v1/auth/refresh";
pub const LOGOUT_PATH: &str = "/v1/auth/logout";
pub const USER_PATH: &str = "/v1/auth/user";
pub const AUTHORIZE_PATH: &str = "/v1/auth/authorize";
pub const PROFILE_PATH: &str = "/v1/profile";

/// Shown when the custom provider is asked for a federated redirect
pub const CUSTOM_PROVIDER_HINT: &str =
    "Please use the sign in form for custom backend authentication.";

/// `POST /v1/auth/refresh` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `GET /v1/auth/authorize` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeQuery {
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// `GET /v1/profile` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: Option<Profile>,
    pub sso_integrations: Vec<SsoIntegration>,
}
