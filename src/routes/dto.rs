//! API response DTOs

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::domain::tweets::{Attachment, Tweet};

/// Characters escaped in the filename segment of an attachment URL
const FILENAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

/// Bare `{"success": bool}` body
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn new(success: bool) -> Self {
        Self { success }
    }
}

/// Absolute (or root-relative, without a public URL) link to an attachment
pub fn image_url(attachment: &Attachment, public_url: Option<&str>) -> String {
    format!(
        "{}/media/{}/{}",
        public_url.unwrap_or_default(),
        attachment.key,
        utf8_percent_encode(&attachment.filename, FILENAME_SET)
    )
}

/// Tweet as returned by POST /tweets
#[derive(Debug, Clone, Serialize)]
pub struct TweetResponse {
    pub username: String,
    pub message: String,
    pub image: Option<String>,
}

impl TweetResponse {
    pub fn from_tweet(tweet: Tweet, public_url: Option<&str>) -> Self {
        Self {
            image: tweet.attachment().map(|a| image_url(&a, public_url)),
            username: tweet.username,
            message: tweet.message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTweetResponse {
    pub tweet: TweetResponse,
}

/// Tweet as it appears in listings; carries the id so clients can delete it
#[derive(Debug, Clone, Serialize)]
pub struct TweetListItem {
    pub id: i64,
    pub username: String,
    pub message: String,
    pub image: Option<String>,
}

impl TweetListItem {
    pub fn from_tweet(tweet: Tweet, public_url: Option<&str>) -> Self {
        Self {
            id: tweet.id,
            image: tweet.attachment().map(|a| image_url(&a, public_url)),
            username: tweet.username,
            message: tweet.message,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TweetListResponse {
    pub tweets: Vec<TweetListItem>,
}
