//! # SSO Bridge Client
//!
//! Session context for applications that sign users in through the SSO
//! bridge auth proxy.
//!
//! ## Module Organization
//!
//! - `config`: Client configuration
//! - `context`: Owned session context and its operations
//! - `error`: Client error types
//! - `notify`: Transient user-facing notifications
//! - `platform`: Identity platform session client
//! - `proxy`: Auth proxy client
//! - `storage`: Persisted token storage

pub mod config;
pub mod context;
pub mod error;
pub mod notify;
pub mod platform;
pub mod proxy;
pub mod storage;

pub use config::ClientConfig;
pub use context::{AuthPhase, AuthState, ContextOptions, SessionContext};
pub use error::ClientError;
pub use notify::{Notification, Variant};
pub use platform::{AuthEvent, HttpPlatform, IdentityPlatform, Session};
pub use proxy::{HttpProxyClient, ProxyClient};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
