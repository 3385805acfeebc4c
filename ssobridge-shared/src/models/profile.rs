/// Profile rows keyed by identity id
///
/// One profile per identity, created in the same transaction as the
/// identity record. The profile viewer reads it together with the user's
/// SSO integrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    /// Same value as the owning identity's id
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub async fn create(
        conn: &mut PgConnection,
        id: Uuid,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, full_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, full_name, avatar_url, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            "SELECT id, email, full_name, avatar_url, created_at FROM profiles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Initials for avatar fallbacks ("Ada Lovelace" -> "AL")
    pub fn initials(&self) -> Option<String> {
        let name = self.full_name.as_deref()?;
        let initials: String = name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        (!initials.is_empty()).then_some(initials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(full_name: Option<&str>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            full_name: full_name.map(str::to_string),
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn initials_from_full_name() {
        assert_eq!(profile(Some("ada lovelace")).initials(), Some("AL".to_string()));
        assert_eq!(profile(Some("  A   B ")).initials(), Some("AB".to_string()));
    }

    #[test]
    fn initials_missing_name() {
        assert_eq!(profile(None).initials(), None);
        assert_eq!(profile(Some("   ")).initials(), None);
    }
}
