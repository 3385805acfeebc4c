/// Backend Auth Service client
///
/// The backend owns credentials and user records. It exposes two calls:
///
/// - `POST /users/signup {email, password, name, roles}` returning the new
///   user object
/// - `POST /auth/login {email, password}` returning `{access_token}`
///
/// [`BackendAuth`] abstracts those calls so the proxy can run against the
/// real service ([`HttpBackendAuth`]) or an in-process fake
/// ([`MemoryBackendAuth`]).

mod http;
mod memory;

pub use http::{normalize_base_url, HttpBackendAuth};
pub use memory::MemoryBackendAuth;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Default display name sent at signup when the caller gives none
pub const DEFAULT_NAME: &str = "User";

/// Default role set sent at signup
pub const DEFAULT_ROLE: &str = "user";

/// User object returned by the backend on signup
///
/// Fields other than `id`, `email` and `roles` are kept in `extra` and
/// echoed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendUser {
    /// Backend user id; the backend may send a string or a number
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Signup payload forwarded to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSignup {
    pub email: String,
    pub password: String,
    pub name: String,
    pub roles: Vec<String>,
}

impl BackendSignup {
    /// Builds a signup payload, applying the default name and roles
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: Option<String>,
        roles: Option<Vec<String>>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            roles: roles
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| vec![DEFAULT_ROLE.to_string()]),
        }
    }
}

/// Login payload forwarded to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendLogin {
    pub email: String,
    pub password: String,
}

/// Backend login reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendLoginResponse {
    /// Opaque backend token handed to the client
    pub access_token: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Backend error type
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-2xx status
    #[error("Backend rejected request with status {status}")]
    Rejected { status: u16, body: Value },

    /// The backend could not be reached
    #[error("Backend unreachable: {0}")]
    Transport(String),

    /// The backend answered 2xx with a body we could not read
    #[error("Unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Upstream status, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Calls offered by the Backend Auth Service
#[async_trait]
pub trait BackendAuth: Send + Sync {
    async fn signup(&self, request: &BackendSignup) -> Result<BackendUser, BackendError>;

    async fn login(&self, request: &BackendLogin) -> Result<BackendLoginResponse, BackendError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
