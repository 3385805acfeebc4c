/// Auth proxy client
///
/// Posts [`ProxyRequest`] bodies to the proxy function and decodes the
/// reply. A reply counts as a failure when its status is not 2xx or when it
/// carries `success: false`.

use crate::error::ClientError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use ssobridge_shared::proxy::{LoginResponse, ProxyRequest, SignupResponse};
use std::time::Duration;

const SIGNUP_FAILED: &str = "Signup failed";
const LOGIN_FAILED: &str = "Login failed";

/// Invokes the auth proxy function
#[async_trait]
pub trait ProxyClient: Send + Sync {
    async fn signup(&self, request: &ProxyRequest) -> Result<SignupResponse, ClientError>;

    async fn login(&self, request: &ProxyRequest) -> Result<LoginResponse, ClientError>;
}

/// [`ProxyClient`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpProxyClient {
    client: reqwest::Client,
    url: String,
}

impl HttpProxyClient {
    /// Creates a client for the proxy function at `url`
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        request: &ProxyRequest,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let response = self.client.post(&self.url).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        if !(200..300).contains(&status) {
            return Err(ClientError::proxy(status, &body, fallback));
        }

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
        if value.get("success").and_then(|s| s.as_bool()) != Some(true) {
            return Err(ClientError::proxy(status, &body, fallback));
        }

        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProxyClient for HttpProxyClient {
    async fn signup(&self, request: &ProxyRequest) -> Result<SignupResponse, ClientError> {
        tracing::debug!(email = %request.email, "Invoking proxy signup");
        self.invoke(request, SIGNUP_FAILED).await
    }

    async fn login(&self, request: &ProxyRequest) -> Result<LoginResponse, ClientError> {
        tracing::debug!(email = %request.email, "Invoking proxy login");
        self.invoke(request, LOGIN_FAILED).await
    }
}
