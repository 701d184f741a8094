//! Tweet domain - validation and DB queries for tweets
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&SqlitePool` and `&mut SqliteConnection` (transactions).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};

use super::{ValidationErrors, check_length};

/// Longest message a tweet may carry, in characters
pub const MAX_MESSAGE_CHARS: usize = 140;

/// Attachment types that are safe to render inline. SVG is excluded since it can carry script.
pub const IMAGE_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

pub fn is_inline_image(content_type: &str) -> bool {
    IMAGE_CONTENT_TYPES.contains(&content_type)
}

/// A tweet joined with its owner's username
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tweet {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub message: String,
    pub image_key: Option<String>,
    pub image_filename: Option<String>,
    pub image_content_type: Option<String>,
    #[allow(dead_code)] // Ordering happens in SQL; not part of the API shape
    pub created_at: DateTime<Utc>,
}

impl Tweet {
    /// Ownership guard for mutations
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    pub fn attachment(&self) -> Option<Attachment> {
        match (&self.image_key, &self.image_filename) {
            (Some(key), Some(filename)) => Some(Attachment {
                key: key.clone(),
                filename: filename.clone(),
                content_type: self
                    .image_content_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            }),
            _ => None,
        }
    }
}

/// Metadata for a file stored in the blob store
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Attachment {
    pub key: String,
    pub filename: String,
    pub content_type: String,
}

/// Tweet input. `user_id` is optional so a missing owner is a validation
/// failure rather than something the type system hides.
#[derive(Debug, Clone, Default)]
pub struct NewTweet {
    pub user_id: Option<i64>,
    pub message: Option<String>,
    pub image: Option<Attachment>,
}

impl NewTweet {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.user_id.is_none() {
            errors.add("user", "must exist");
        }

        match self.message.as_deref() {
            Some(message) if !message.trim().is_empty() => {
                check_length(&mut errors, "message", message, 1, MAX_MESSAGE_CHARS);
            }
            _ => errors.add("message", "can't be blank"),
        }

        if let Some(image) = &self.image {
            if !is_inline_image(&image.content_type) {
                errors.add("image", "must be a PNG, JPEG, GIF or WebP image");
            }
        }

        errors.into_result()
    }
}

#[derive(Debug)]
pub enum CreateTweetError {
    Invalid(ValidationErrors),
    Db(sqlx::Error),
}

impl std::fmt::Display for CreateTweetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateTweetError::Invalid(errors) => write!(f, "Validation failed: {}", errors),
            CreateTweetError::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

const SELECT_TWEETS: &str = r#"
    SELECT t.id, t.user_id, u.username, t.message,
           t.image_key, t.image_filename, t.image_content_type, t.created_at
    FROM tweets t
    JOIN users u ON u.id = t.user_id
"#;

/// Validate and insert a tweet, returning it with the owner's username
pub async fn create_tweet<'e, E>(executor: E, new: &NewTweet) -> Result<Tweet, CreateTweetError>
where
    E: Executor<'e, Database = Sqlite> + Copy,
{
    new.validate().map_err(CreateTweetError::Invalid)?;

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tweets (user_id, message, image_key, image_filename, image_content_type, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(new.user_id)
    .bind(new.message.as_deref())
    .bind(new.image.as_ref().map(|a| a.key.as_str()))
    .bind(new.image.as_ref().map(|a| a.filename.as_str()))
    .bind(new.image.as_ref().map(|a| a.content_type.as_str()))
    .bind(Utc::now())
    .fetch_one(executor)
    .await
    .map_err(CreateTweetError::Db)?;

    get_tweet(executor, id)
        .await
        .map_err(CreateTweetError::Db)?
        .ok_or(CreateTweetError::Db(sqlx::Error::RowNotFound))
}

/// All tweets, newest first
pub async fn list_tweets<'e, E>(executor: E) -> Result<Vec<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} ORDER BY t.created_at DESC, t.id DESC", SELECT_TWEETS);
    sqlx::query_as(&query).fetch_all(executor).await
}

/// Tweets owned by one user, newest first
pub async fn list_tweets_by_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "{} WHERE t.user_id = $1 ORDER BY t.created_at DESC, t.id DESC",
        SELECT_TWEETS
    );
    sqlx::query_as(&query).bind(user_id).fetch_all(executor).await
}

/// Get a single tweet by ID
pub async fn get_tweet<'e, E>(executor: E, tweet_id: i64) -> Result<Option<Tweet>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} WHERE t.id = $1", SELECT_TWEETS);
    sqlx::query_as(&query).bind(tweet_id).fetch_optional(executor).await
}

/// Look up attachment metadata by its storage key
pub async fn get_attachment<'e, E>(executor: E, key: &str) -> Result<Option<Attachment>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"
        SELECT image_key AS key, image_filename AS filename,
               COALESCE(image_content_type, 'application/octet-stream') AS content_type
        FROM tweets
        WHERE image_key = $1 AND image_filename IS NOT NULL
        "#,
    )
    .bind(key)
    .fetch_optional(executor)
    .await
}

/// Delete a tweet owned by the given user. Returns false if nothing matched.
pub async fn delete_tweet<'e, E>(executor: E, tweet_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM tweets WHERE id = $1 AND user_id = $2")
        .bind(tweet_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
