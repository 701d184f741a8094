//! Session domain - login sessions keyed by an opaque token

use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{Executor, Sqlite};

use super::users::User;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    #[allow(dead_code)] // Fetched from DB but not exposed in API responses
    pub created_at: DateTime<Utc>,
}

/// Generate a random 32-byte session token, base64url encoded
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Start a session for a user
pub async fn create_session<'e, E>(executor: E, user_id: i64) -> Result<Session, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        INSERT INTO sessions (user_id, token, created_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, token, created_at
        "#,
    )
    .bind(user_id)
    .bind(generate_token())
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Resolve a session token to the user that owns it
pub async fn find_user_by_token<'e, E>(executor: E, token: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT u.id, u.username, u.email, u.password_digest, u.created_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1
        "#,
    )
    .bind(token)
    .fetch_optional(executor)
    .await
}

/// End a session. Returns false if no session had that token.
pub async fn delete_session<'e, E>(executor: E, token: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
