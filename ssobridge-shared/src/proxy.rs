/// Auth proxy wire contract
///
/// Request and response bodies of the auth proxy function, shared by the
/// server (`ssobridge-api`) and the session client (`ssobridge-client`).
///
/// # Request
///
/// ```json
/// { "action": "signup", "email": "a@b.com", "password": "pw1", "name": "A B" }
/// ```
///
/// `action` is `signup` or `login`. `signin` is still accepted as an alias
/// of `login` for older clients.
///
/// # Errors
///
/// Every failure answers with [`ErrorResponse`]; `success` is always false.

use crate::auth::session::SessionTokens;
use crate::backend::BackendUser;
use crate::models::identity::IdentityRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Path the proxy function is mounted at
pub const PROXY_PATH: &str = "/functions/v1/custom-sso";

/// Versioned alias of [`PROXY_PATH`]
pub const PROXY_ALIAS_PATH: &str = "/v1/proxy";

/// Deprecated spelling of the `login` action
pub const SIGNIN_ALIAS: &str = "signin";

/// Error message for an unknown action
pub const INVALID_ACTION: &str = "Invalid action";

/// Proxy actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyAction {
    Signup,
    Login,
}

impl ProxyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyAction::Signup => "signup",
            ProxyAction::Login => "login",
        }
    }

    /// Parses a wire action, mapping the `signin` alias to `Login`
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "signup" => Some(ProxyAction::Signup),
            "login" | SIGNIN_ALIAS => Some(ProxyAction::Login),
            _ => None,
        }
    }
}

/// Proxy request body
///
/// `action` stays a string so an unknown action is answered with
/// "Invalid action" rather than a deserialization error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProxyRequest {
    pub action: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 320, message = "Email is required"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// Display name (signup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Roles to request (signup only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl ProxyRequest {
    pub fn signup(
        email: impl Into<String>,
        password: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            action: ProxyAction::Signup.as_str().to_string(),
            email: email.into(),
            password: password.into(),
            name,
            roles: None,
        }
    }

    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            action: ProxyAction::Login.as_str().to_string(),
            email: email.into(),
            password: password.into(),
            name: None,
            roles: None,
        }
    }
}

/// Successful signup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignupResponse {
    pub success: bool,

    /// Identity mirrored into the platform
    pub user: IdentityRecord,

    /// User object as returned by the backend
    pub backend_user: BackendUser,
}

/// Successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,

    /// Opaque backend token
    pub backend_token: String,

    /// Platform session tokens
    pub session: SessionTokens,

    pub user: IdentityRecord,
}

/// Upstream reply forwarded on backend failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamError {
    pub status: u16,
    pub body: Value,
}

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error body returned by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,

    /// Human-readable message
    pub error: String,

    /// Machine-readable code (e.g. "invalid_action", "backend_error")
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
            upstream: None,
            details: None,
        }
    }
}
