/// Database models for the identity platform
///
/// - `identity`: identity records mirrored from the backend auth service
/// - `profile`: one profile row per identity
/// - `sso_integration`: append-only provider link rows
/// - `outbox`: pending SSO-link writes drained by the reconciler
/// - `session`: issued platform sessions, revocable on sign-out
///
/// Each model exposes its queries as associated functions taking a pool or
/// a connection; `store::PgIdentityStore` composes them.

pub mod identity;
pub mod outbox;
pub mod profile;
pub mod session;
pub mod sso_integration;
