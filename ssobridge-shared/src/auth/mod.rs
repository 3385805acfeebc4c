/// Authentication primitives for the identity platform
///
/// - [`jwt`]: HS256 access/refresh tokens bound to a session id
/// - [`token`]: refresh token fingerprints stored on session rows
/// - [`session`]: session issuance, refresh, authentication and revocation

pub mod jwt;
pub mod session;
pub mod token;
