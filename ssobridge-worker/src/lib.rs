//! # SSO Bridge Worker Library
//!
//! Background reconciliation of SSO-link outbox entries into
//! `sso_integrations` rows.
//!
//! ## Modules
//!
//! - `config`: Reconciler configuration (`RECONCILER_*`)
//! - `reconciler`: Outbox polling, retry and parking

pub mod config;
pub mod reconciler;
