//! # SSO Bridge API Server Library
//!
//! Hosts the auth proxy function and the identity platform endpoints.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Bearer authentication and security headers
//! - `proxy`: Signup/login orchestration between backend and platform
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod routes;
