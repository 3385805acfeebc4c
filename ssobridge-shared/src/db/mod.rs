/// Database layer for the identity store
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: embedded sqlx migrations for the identity schema
///
/// Table access lives in the `models` module; the storage seam used by the
/// API and worker is `store::IdentityStore`.

pub mod migrations;
pub mod pool;
