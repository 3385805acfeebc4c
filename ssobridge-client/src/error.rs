/// Client error types
///
/// Proxy failures and platform session failures are separate variants so a
/// caller can tell "the backend refused the credentials" apart from "the
/// backend accepted them but no platform session could be established".

use ssobridge_shared::proxy::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The auth proxy answered with a failure
    #[error("{message}")]
    Proxy {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// Login succeeded but the platform session could not be set up
    #[error("Session creation failed: {0}")]
    SessionEstablishment(String),

    /// An identity platform endpoint answered with a failure
    #[error("{message}")]
    Platform { status: u16, message: String },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Token storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// HTTP status of the failing reply, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Proxy { status, .. } | ClientError::Platform { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the platform rejected the session's tokens
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Platform { status: 401, .. })
    }

    /// Builds a proxy error from a reply body, falling back to `fallback`
    /// when the body is not an [`ErrorResponse`]
    pub(crate) fn proxy(status: u16, body: &[u8], fallback: &str) -> Self {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(err) => ClientError::Proxy {
                status,
                message: err.error,
                code: Some(err.code),
            },
            Err(_) => ClientError::Proxy {
                status,
                message: fallback.to_string(),
                code: None,
            },
        }
    }

    /// Builds a platform error from a reply body
    pub(crate) fn platform(status: u16, body: &[u8]) -> Self {
        let message = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(err) => err.error,
            Err(_) if !body.is_empty() => String::from_utf8_lossy(body).into_owned(),
            Err(_) => format!("Request failed with status {}", status),
        };
        ClientError::Platform { status, message }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
