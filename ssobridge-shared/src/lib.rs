//! # SSO Bridge Shared Library
//!
//! Types and logic shared by the SSO bridge API server, the SSO-link
//! reconciler and the session client.
//!
//! ## Module Organization
//!
//! - `auth`: JWT sessions and refresh token fingerprints
//! - `backend`: Backend Auth Service client
//! - `db`: Postgres pool and migrations
//! - `models`: Database models
//! - `platform`: Identity platform wire types
//! - `proxy`: Auth proxy wire contract
//! - `store`: Identity store trait with Postgres and in-memory implementations

pub mod auth;
pub mod backend;
pub mod db;
pub mod models;
pub mod platform;
pub mod proxy;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
