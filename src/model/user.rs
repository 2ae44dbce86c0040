use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::MySqlPool;

use super::role::Role;

#[derive(Debug, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub async fn find_by_email(pool: &MySqlPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, email, name, phone, password, role, last_login_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &MySqlPool, id: u64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, email, name, phone, password, role, last_login_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Unknown labels fall back to the least privileged role.
    pub fn role(&self) -> Role {
        Role::from_label(&self.role).unwrap_or(Role::Employee)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            phone: self.phone.clone(),
            role: self.role(),
        }
    }
}

/// What a client may see of an account.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UserProfile {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[inline]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
