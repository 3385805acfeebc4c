/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `JWT_SECRET`: Secret key for session tokens, at least 32 characters (required)
/// - `ACCESS_TOKEN_TTL_SECS`: Access token lifetime (default: 3600)
/// - `BACKEND_BASE_URL`: Backend auth service, `host:port` or a full URL (required)
/// - `BACKEND_TIMEOUT_SECS`: Backend request timeout (default: none)
/// - `PROVISION_MISSING_IDENTITY`: Create an identity at login when none exists (default: false)
/// - `OAUTH_PROVIDERS`: Comma-separated federated providers, e.g. `google,github`
/// - `OAUTH_<PROVIDER>_AUTHORIZE_URL`, `OAUTH_<PROVIDER>_CLIENT_ID`: per provider
/// - `RUST_LOG`, `LOG_FORMAT`: logging (read in `main`)
///
/// # Example
///
/// ```no_run
/// use ssobridge_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub backend: BackendConfig,
    pub proxy: ProxyConfig,
    pub oauth: OAuthConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be kept secret and be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Access token lifetime in seconds
    pub access_token_ttl_secs: i64,
}

/// Backend auth service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,

    /// Request timeout; None waits indefinitely
    pub timeout_secs: Option<u64>,
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Proxy behavior switches
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Create an identity record at login when the backend accepts
    /// credentials for an email the platform has never seen
    pub provision_missing_identity: bool,
}

/// Federated sign-in providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Keyed by lowercase provider name
    pub providers: BTreeMap<String, OAuthProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProvider {
    pub authorize_url: String,
    pub client_id: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// Reads a `.env` file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{key} environment variable is required"))
        };

        let api_host = var_or("API_HOST", "0.0.0.0");
        let api_port = var_or("API_PORT", "8080").parse::<u16>()?;

        let cors_origins = var_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let production = parse_bool("PRODUCTION", &var_or("PRODUCTION", "false"))?;

        let database_url = required("DATABASE_URL")?;
        let max_connections = var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        let access_token_ttl_secs = var_or("ACCESS_TOKEN_TTL_SECS", "3600").parse::<i64>()?;
        if access_token_ttl_secs <= 0 {
            anyhow::bail!("ACCESS_TOKEN_TTL_SECS must be positive");
        }

        let backend_url = required("BACKEND_BASE_URL")?;
        let backend_timeout = lookup("BACKEND_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()?;

        let provision_missing_identity = parse_bool(
            "PROVISION_MISSING_IDENTITY",
            &var_or("PROVISION_MISSING_IDENTITY", "false"),
        )?;

        let mut providers = BTreeMap::new();
        for name in var_or("OAUTH_PROVIDERS", "").split(',') {
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            let prefix = format!("OAUTH_{}", name.to_ascii_uppercase());
            let provider = OAuthProvider {
                authorize_url: required(&format!("{prefix}_AUTHORIZE_URL"))?,
                client_id: required(&format!("{prefix}_CLIENT_ID"))?,
            };
            providers.insert(name, provider);
        }

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_token_ttl_secs,
            },
            backend: BackendConfig {
                base_url: backend_url,
                timeout_secs: backend_timeout,
            },
            proxy: ProxyConfig {
                provision_missing_identity,
            },
            oauth: OAuthConfig { providers },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{key} must be a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgresql://localhost/test"),
        ("JWT_SECRET", "test-secret-key-at-least-32-bytes-long"),
        ("BACKEND_BASE_URL", "192.168.244.31:4078"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert!(!config.proxy.provision_missing_identity);
        assert_eq!(config.jwt.access_token_ttl_secs, 3600);
        assert_eq!(config.backend.timeout(), None);
        assert!(config.oauth.providers.is_empty());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut vars = BASE.to_vec();
        vars[1] = ("JWT_SECRET", "short");
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_missing_backend_rejected() {
        let result = Config::from_lookup(lookup(&BASE[..2]));
        assert!(result.is_err());
    }

    #[test]
    fn test_oauth_providers_and_flags() {
        let mut vars = BASE.to_vec();
        vars.extend_from_slice(&[
            ("OAUTH_PROVIDERS", "Google, github"),
            ("OAUTH_GOOGLE_AUTHORIZE_URL", "https://accounts.example.com/auth"),
            ("OAUTH_GOOGLE_CLIENT_ID", "g-client"),
            ("OAUTH_GITHUB_AUTHORIZE_URL", "https://github.example.com/login"),
            ("OAUTH_GITHUB_CLIENT_ID", "gh-client"),
            ("PROVISION_MISSING_IDENTITY", "true"),
            ("BACKEND_TIMEOUT_SECS", "5"),
        ]);

        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.oauth.providers.len(), 2);
        assert_eq!(config.oauth.providers["google"].client_id, "g-client");
        assert!(config.proxy.provision_missing_identity);
        assert_eq!(config.backend.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_provider_without_url_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("OAUTH_PROVIDERS", "google"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
