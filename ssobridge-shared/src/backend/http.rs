/// reqwest-backed Backend Auth Service client

use super::{BackendAuth, BackendError, BackendLogin, BackendLoginResponse, BackendSignup, BackendUser};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

const SIGNUP_PATH: &str = "/users/signup";
const LOGIN_PATH: &str = "/auth/login";

/// HTTP client for the Backend Auth Service
#[derive(Debug, Clone)]
pub struct HttpBackendAuth {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendAuth {
    /// Creates a client for `base_url`
    ///
    /// A base URL without a scheme (`host:port`) is treated as plain HTTP.
    /// `timeout` of None leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "Backend rejected request");
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body: parse_body(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| BackendError::Decode(format!("{e}: {text}")))
    }
}

#[async_trait]
impl BackendAuth for HttpBackendAuth {
    async fn signup(&self, request: &BackendSignup) -> Result<BackendUser, BackendError> {
        self.post(SIGNUP_PATH, request).await
    }

    async fn login(&self, request: &BackendLogin) -> Result<BackendLoginResponse, BackendError> {
        self.post(LOGIN_PATH, request).await
    }
}

/// Adds `http://` to scheme-less base URLs and drops trailing slashes
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Upstream bodies are forwarded as JSON when they parse, else as a string
fn parse_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
