/// API route handlers
///
/// - `health`: Health check endpoint
/// - `proxy`: Auth proxy function (signup, login)
/// - `auth`: Platform session endpoints (refresh, logout, user, authorize)
/// - `profile`: Profile viewer endpoint

pub mod auth;
pub mod health;
pub mod profile;
pub mod proxy;
