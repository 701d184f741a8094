//! Tweet endpoints (/tweets, /users/:username/tweets)

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Multipart, Path, Request, State, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
    routing::{delete, get},
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{AuthUser, CurrentUser};
use super::dto::{CreateTweetResponse, SuccessResponse, TweetListItem, TweetListResponse, TweetResponse};
use crate::AppState;
use crate::domain::tweets::{self, Attachment, CreateTweetError, NewTweet};
use crate::domain::users;
use crate::services::error::{ApiError, LogErr};
use crate::storage::{BlobStore, sanitize_filename};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tweets", get(list_tweets).post(create_tweet))
        .route("/tweets/{id}", delete(delete_tweet))
        .route("/users/{username}/tweets", get(list_user_tweets))
}

// ============================================================================
// Request body - multipart form, urlencoded form or JSON
// ============================================================================

/// An uploaded file, already read into memory
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Tweet fields as submitted, before validation
pub struct TweetForm {
    pub message: Option<String>,
    pub image: Option<Upload>,
}

#[derive(Debug, Default, Deserialize)]
struct TweetRequest {
    #[serde(default)]
    tweet: TweetParams,
}

#[derive(Debug, Default, Deserialize)]
struct TweetParams {
    #[serde(default)]
    message: Option<String>,
}

/// Plain HTML form post, sent by browsers when no file is attached
#[derive(Debug, Deserialize)]
struct TweetFormParams {
    #[serde(rename = "tweet[message]", alias = "message", default)]
    message: Option<String>,
}

/// Media type without parameters, lowercased (`Image/PNG; x=y` -> `image/png`)
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::warn!("Multipart error: {}", e);
    ApiError::Status(e.status())
}

impl FromRequest<Arc<AppState>> for TweetForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let media_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(essence)
            .unwrap_or_default();

        match media_type.as_str() {
            "multipart/form-data" => {}
            "application/x-www-form-urlencoded" => {
                let Form(params) = Form::<TweetFormParams>::from_request(req, state)
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                return Ok(TweetForm {
                    message: params.message,
                    image: None,
                });
            }
            _ => {
                let Json(body) = Json::<TweetRequest>::from_request(req, state).await?;
                return Ok(TweetForm {
                    message: body.tweet.message,
                    image: None,
                });
            }
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let mut form = TweetForm {
            message: None,
            image: None,
        };
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "tweet[message]" | "message" => {
                    form.message = Some(field.text().await.map_err(multipart_error)?);
                }
                "tweet[image]" | "image" => {
                    let filename = field
                        .file_name()
                        .map(sanitize_filename)
                        .unwrap_or_else(|| "file".to_string());
                    let content_type = field
                        .content_type()
                        .map(essence)
                        .unwrap_or_else(|| "application/octet-stream".to_string());
                    let data = field.bytes().await.map_err(multipart_error)?;
                    // Browsers send an empty part when no file was chosen
                    if !data.is_empty() {
                        form.image = Some(Upload {
                            filename,
                            content_type,
                            data,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /tweets - Create a tweet as the logged-in user
async fn create_tweet(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    form: TweetForm,
) -> Result<(StatusCode, Json<CreateTweetResponse>), ApiError> {
    let (image, data) = match form.image {
        Some(upload) => (
            Some(Attachment {
                key: BlobStore::generate_key(),
                filename: upload.filename,
                content_type: upload.content_type,
            }),
            upload.data,
        ),
        None => (None, Bytes::new()),
    };
    let new_tweet = NewTweet {
        user_id: Some(user.id),
        message: form.message,
        image,
    };
    // Reject bad input before anything touches the blob store
    new_tweet.validate()?;

    if let Some(attachment) = &new_tweet.image {
        state
            .storage
            .put(&attachment.key, &attachment.filename, &data)
            .await
            .log_500("Store attachment error")?;
    }

    let tweet = match tweets::create_tweet(&state.db, &new_tweet).await {
        Ok(tweet) => tweet,
        Err(e) => {
            if let Some(attachment) = &new_tweet.image {
                if let Err(cleanup) = state.storage.delete(&attachment.key).await {
                    tracing::warn!(key = %attachment.key, "Orphaned attachment: {}", cleanup);
                }
            }
            return Err(match e {
                CreateTweetError::Invalid(errors) => errors.into(),
                CreateTweetError::Db(e) => {
                    tracing::error!("Create tweet error: {}", e);
                    ApiError::Internal
                }
            });
        }
    };

    tracing::info!(
        tweet_id = tweet.id,
        user_id = user.id,
        has_image = new_tweet.image.is_some(),
        "Tweet created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateTweetResponse {
            tweet: TweetResponse::from_tweet(tweet, state.config.public_url.as_deref()),
        }),
    ))
}

/// GET /tweets - All tweets, newest first
async fn list_tweets(State(state): State<Arc<AppState>>) -> Result<Json<TweetListResponse>, ApiError> {
    let result = tweets::list_tweets(&state.db)
        .await
        .log_500("List tweets error")?;

    let public_url = state.config.public_url.as_deref();
    Ok(Json(TweetListResponse {
        tweets: result
            .into_iter()
            .map(|t| TweetListItem::from_tweet(t, public_url))
            .collect(),
    }))
}

/// GET /users/:username/tweets - One user's tweets, newest first
async fn list_user_tweets(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<TweetListResponse>, ApiError> {
    let user = users::get_user_by_username(&state.db, &username)
        .await
        .log_500("Get user by username error")?
        .ok_or(ApiError::NotFound("user"))?;

    let result = tweets::list_tweets_by_user(&state.db, user.id)
        .await
        .log_500("List user tweets error")?;

    let public_url = state.config.public_url.as_deref();
    Ok(Json(TweetListResponse {
        tweets: result
            .into_iter()
            .map(|t| TweetListItem::from_tweet(t, public_url))
            .collect(),
    }))
}

/// DELETE /tweets/:id - Delete one of the current user's tweets
async fn delete_tweet(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(raw_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let Some(user) = user else {
        return Ok(Json(SuccessResponse::new(false)));
    };
    // An id that can't name a row is just a missing tweet
    let Ok(tweet_id) = raw_id.parse::<i64>() else {
        return Ok(Json(SuccessResponse::new(false)));
    };

    let Some(tweet) = tweets::get_tweet(&state.db, tweet_id)
        .await
        .log_500("Get tweet error")?
        .filter(|t| t.is_owned_by(user.id))
    else {
        tracing::warn!(tweet_id, user_id = user.id, "Delete of missing or foreign tweet");
        return Ok(Json(SuccessResponse::new(false)));
    };

    let deleted = tweets::delete_tweet(&state.db, tweet.id, user.id)
        .await
        .log_500("Delete tweet error")?;

    if deleted {
        if let Some(attachment) = tweet.attachment() {
            if let Err(e) = state.storage.delete(&attachment.key).await {
                tracing::warn!(key = %attachment.key, "Failed to remove attachment: {}", e);
            }
        }
        tracing::info!(tweet_id, user_id = user.id, "Tweet deleted");
    }

    Ok(Json(SuccessResponse::new(deleted)))
}
