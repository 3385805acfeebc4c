/// Client configuration
///
/// Plain struct; applications fill it from whatever settings source they
/// already have.
///
/// # Example
///
/// ```
/// use ssobridge_client::ClientConfig;
///
/// let config = ClientConfig::new("https://auth.example.com/")
///     .with_storage_path("/tmp/ssobridge/tokens.json")
///     .with_auto_refresh(true);
///
/// assert_eq!(config.proxy_url, "https://auth.example.com/functions/v1/custom-sso");
/// assert_eq!(config.platform_url, "https://auth.example.com");
/// ```

use crate::error::ClientError;
use crate::storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
use ssobridge_shared::proxy::PROXY_PATH;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Refresh this long before the access token expires
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the auth proxy function
    pub proxy_url: String,

    /// Base URL of the identity platform endpoints
    pub platform_url: String,

    /// JSON file for persisted tokens; in-memory when None
    pub storage_path: Option<PathBuf>,

    /// Per-request timeout; none when unset
    pub timeout: Option<Duration>,

    /// Refresh the access token in the background before it expires
    pub auto_refresh: bool,

    pub refresh_margin: Duration,

    /// `redirect_to` passed on federated sign-in
    pub sso_redirect_to: Option<String>,
}

impl ClientConfig {
    /// Configuration for a deployment serving both the proxy and the
    /// platform endpoints under `base_url`
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            proxy_url: format!("{}{}", base, PROXY_PATH),
            platform_url: base.to_string(),
            storage_path: None,
            timeout: None,
            auto_refresh: false,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            sso_redirect_to: None,
        }
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn with_sso_redirect_to(mut self, redirect_to: impl Into<String>) -> Self {
        self.sso_redirect_to = Some(redirect_to.into());
        self
    }

    /// Builds the configured token storage
    pub fn storage(&self) -> Result<Arc<dyn TokenStorage>, ClientError> {
        Ok(match &self.storage_path {
            Some(path) => {
                if path.as_os_str().is_empty() {
                    return Err(ClientError::Storage("Storage path is empty".to_string()));
                }
                Arc::new(FileTokenStorage::new(path.clone()))
            }
            None => Arc::new(MemoryTokenStorage::new()),
        })
    }
}
