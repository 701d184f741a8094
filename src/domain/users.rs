//! User domain - validation and DB queries for users

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use super::{ValidationErrors, check_length, is_unique_violation};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    #[allow(dead_code)] // Selected with the row; responses don't include it
    pub created_at: DateTime<Utc>,
}

/// Signup input before the password is hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.username.trim().is_empty() {
            errors.add("username", "can't be blank");
        } else {
            check_length(&mut errors, "username", &self.username, 3, 64);
        }

        if self.email.trim().is_empty() {
            errors.add("email", "can't be blank");
        } else {
            check_length(&mut errors, "email", &self.email, 5, 500);
            if !self.email.contains('@') {
                errors.add("email", "is invalid");
            }
        }

        if self.password.is_empty() {
            errors.add("password", "can't be blank");
        } else {
            check_length(&mut errors, "password", &self.password, 8, 64);
        }

        errors.into_result()
    }
}

#[derive(Debug)]
pub enum CreateUserError {
    Taken(ValidationErrors),
    Db(sqlx::Error),
}

impl std::fmt::Display for CreateUserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateUserError::Taken(errors) => write!(f, "{}", errors),
            CreateUserError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

/// Insert a user with an already-hashed password.
///
/// Uniqueness is checked up front for friendly messages; the UNIQUE constraints
/// still decide races.
pub async fn create_user<'e, E>(
    executor: E,
    username: &str,
    email: &str,
    password_digest: &str,
) -> Result<User, CreateUserError>
where
    E: Executor<'e, Database = Sqlite> + Copy,
{
    let clashes: Vec<(String, String)> =
        sqlx::query_as("SELECT username, email FROM users WHERE username = $1 OR email = $2")
            .bind(username)
            .bind(email)
            .fetch_all(executor)
            .await
            .map_err(CreateUserError::Db)?;

    let mut errors = ValidationErrors::default();
    if clashes.iter().any(|(u, _)| u == username) {
        errors.add("username", "has already been taken");
    }
    if clashes.iter().any(|(_, e)| e == email) {
        errors.add("email", "has already been taken");
    }
    errors.into_result().map_err(CreateUserError::Taken)?;

    sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password_digest, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, username, email, password_digest, created_at
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_digest)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            // sqlite names the column: "UNIQUE constraint failed: users.email"
            let field = if e.to_string().contains("users.email") { "email" } else { "username" };
            let mut errors = ValidationErrors::default();
            errors.add(field, "has already been taken");
            CreateUserError::Taken(errors)
        } else {
            CreateUserError::Db(e)
        }
    })
}

/// Get a user by username
pub async fn get_user_by_username<'e, E>(
    executor: E,
    username: &str,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "SELECT id, username, email, password_digest, created_at FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
pub(crate) async fn insert_test_user(pool: &sqlx::SqlitePool, username: &str) -> User {
    create_user(pool, username, &format!("{}@user.com", username), "not-a-real-digest")
        .await
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::testing;

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn accepts_reasonable_signup() {
        assert!(new_user("user1", "user1@user.com", "password1").validate().is_ok());
    }

    #[test]
    fn rejects_short_fields() {
        let errors = new_user("ab", "a@b", "short").validate().unwrap_err();
        assert_eq!(errors.on("username"), ["is too short (minimum is 3 characters)".to_string()]);
        assert_eq!(errors.on("email"), ["is too short (minimum is 5 characters)".to_string()]);
        assert_eq!(errors.on("password"), ["is too short (minimum is 8 characters)".to_string()]);
    }

    #[test]
    fn rejects_blank_and_malformed() {
        let errors = new_user("   ", "not-an-email", "").validate().unwrap_err();
        assert_eq!(errors.on("username"), ["can't be blank".to_string()]);
        assert_eq!(errors.on("email"), ["is invalid".to_string()]);
        assert_eq!(errors.on("password"), ["can't be blank".to_string()]);
    }

    #[tokio::test]
    async fn create_and_fetch_user() {
        let pool = testing::pool().await;
        let user = create_user(&pool, "user1", "user1@user.com", "digest").await.unwrap();

        let by_name = get_user_by_username(&pool, "user1").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.email, "user1@user.com");

        assert!(get_user_by_username(&pool, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_taken() {
        let pool = testing::pool().await;
        create_user(&pool, "user1", "user1@user.com", "digest").await.unwrap();

        match create_user(&pool, "user1", "user1@user.com", "digest").await {
            Err(CreateUserError::Taken(errors)) => {
                assert_eq!(errors.on("username"), ["has already been taken".to_string()]);
                assert_eq!(errors.on("email"), ["has already been taken".to_string()]);
            }
            other => panic!("expected Taken, got {:?}", other.map(|u| u.username)),
        }
    }
}
