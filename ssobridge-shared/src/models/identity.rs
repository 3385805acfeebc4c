/// Identity record model and database operations
///
/// An identity record mirrors a user accepted by the backend auth service
/// into the identity platform. It carries the backend user id in its
/// metadata so the two systems can be joined later.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE identity_records (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL,                 -- normalized, unique
///     full_name TEXT,
///     backend_user_id TEXT,
///     roles TEXT[] NOT NULL DEFAULT '{}',
///     email_confirmed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Lookups by email go through the unique index; there is no listing path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Name of the unique constraint on `identity_records.email`
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "identity_records_email_key";

const IDENTITY_COLUMNS: &str =
    "id, email, full_name, backend_user_id, roles, email_confirmed_at, created_at, updated_at";

/// User-facing metadata attached to an identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityMetadata {
    /// Display name supplied at signup
    pub full_name: Option<String>,

    /// Id of the matching user in the backend auth service
    ///
    /// None only for identities provisioned lazily at login.
    pub backend_user_id: Option<String>,

    /// Roles reported by the backend at signup
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Identity record owned by the identity platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityRecord {
    pub id: Uuid,

    /// Normalized email address (unique)
    pub email: String,

    #[sqlx(flatten)]
    pub metadata: IdentityMetadata,

    /// Set at creation: mirrored identities skip email verification
    pub email_confirmed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an identity record
#[derive(Debug, Clone)]
pub struct CreateIdentity {
    /// Email address; must already be normalized with [`normalize_email`]
    pub email: String,

    pub metadata: IdentityMetadata,

    /// Whether to mark the email as confirmed on creation
    pub email_confirmed: bool,
}

impl IdentityRecord {
    /// Inserts a new identity record
    ///
    /// Takes a connection so callers can run it inside a transaction with
    /// the profile row and the SSO-link outbox entry.
    ///
    /// # Errors
    ///
    /// Fails with a database error carrying [`EMAIL_UNIQUE_CONSTRAINT`] when
    /// the email is already mirrored.
    pub async fn create(conn: &mut PgConnection, data: CreateIdentity) -> Result<Self, sqlx::Error> {
        let confirmed_at = data.email_confirmed.then(Utc::now);

        sqlx::query_as::<_, IdentityRecord>(&format!(
            r#"
            INSERT INTO identity_records (email, full_name, backend_user_id, roles, email_confirmed_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {IDENTITY_COLUMNS}
            "#
        ))
        .bind(data.email)
        .bind(data.metadata.full_name)
        .bind(data.metadata.backend_user_id)
        .bind(data.metadata.roles)
        .bind(confirmed_at)
        .fetch_one(conn)
        .await
    }

    /// Finds an identity by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IdentityRecord>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identity_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds an identity by normalized email (indexed lookup)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IdentityRecord>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identity_records WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
    }
}

/// Normalizes an email address for storage and lookup
///
/// Trims whitespace and lowercases. Returns None unless the address has
/// exactly one `@` with non-empty local and domain parts.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(
            normalize_email("  A@B.com "),
            Some("a@b.com".to_string())
        );
    }

    #[test]
    fn normalize_email_rejects_malformed() {
        assert_eq!(normalize_email(""), None);
        assert_eq!(normalize_email("user"), None);
        assert_eq!(normalize_email("@b.com"), None);
        assert_eq!(normalize_email("a@"), None);
        assert_eq!(normalize_email("a@b@c"), None);
    }

    #[test]
    fn metadata_serializes_backend_user_id() {
        let metadata = IdentityMetadata {
            full_name: Some("A B".to_string()),
            backend_user_id: Some("42".to_string()),
            roles: vec!["user".to_string()],
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["backend_user_id"], "42");
        assert_eq!(json["roles"][0], "user");
    }
}
