//! Attachment delivery (/media/*)

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::AppState;
use crate::domain::tweets;
use crate::services::error::{ApiError, LogErr};
use crate::storage::StorageError;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/media/{key}/{filename}", get(get_media))
}

/// GET /media/:key/:filename - Serve an attachment's bytes
async fn get_media(
    State(state): State<Arc<AppState>>,
    Path((key, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = tweets::get_attachment(&state.db, &key)
        .await
        .log_500("Get attachment error")?
        .filter(|a| a.filename == filename)
        .ok_or(ApiError::NotFound("attachment"))?;

    let bytes = match state.storage.get(&attachment.key, &attachment.filename).await {
        Ok(bytes) => bytes,
        Err(StorageError::NotFound) => {
            tracing::warn!(%key, "Attachment row without a stored blob");
            return Err(ApiError::NotFound("attachment"));
        }
        Err(e) => Err(e).log_500("Read attachment error")?,
    };

    // Only known raster types render inline; anything else downloads as opaque bytes
    let (content_type, disposition) = if tweets::is_inline_image(&attachment.content_type) {
        (attachment.content_type, "inline".to_string())
    } else {
        tracing::warn!(%key, content_type = %attachment.content_type, "Serving non-image attachment as download");
        (
            "application/octet-stream".to_string(),
            format!("attachment; filename=\"{}\"", attachment.filename),
        )
    };

    // Keys are random and never reused, so the content is immutable
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{BuilderExt, TestApp};
    use crate::domain::tweets::Attachment;
    use axum::http::{
        Method, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
    };

    async fn tweet_with_image(app: &TestApp) -> Attachment {
        let user = app.create_user("user1").await;
        let image = Attachment {
            key: "somekey".to_string(),
            filename: "test.png".to_string(),
            content_type: "image/png".to_string(),
        };
        store_attachment(app, user.id, image).await
    }

    /// Stores the blob and the row directly, bypassing upload validation
    async fn store_attachment(app: &TestApp, user_id: i64, image: Attachment) -> Attachment {
        app.state
            .storage
            .put(&image.key, &image.filename, b"\x89PNG fake")
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO tweets (user_id, message, image_key, image_filename, image_content_type, created_at)
             VALUES ($1, 'pic', $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(&image.key)
        .bind(&image.filename)
        .bind(&image.content_type)
        .bind(chrono::Utc::now())
        .execute(&app.state.db)
        .await
        .unwrap();
        image
    }

    #[tokio::test]
    async fn serves_stored_bytes_with_content_type() {
        let app = TestApp::new().await;
        tweet_with_image(&app).await;

        let response = app
            .send(app.request(Method::GET, "/media/somekey/test.png").body_empty())
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[CONTENT_TYPE], "image/png");
        assert_eq!(response.headers[CONTENT_DISPOSITION], "inline");
        assert_eq!(response.headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.body, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn non_image_is_served_as_opaque_download() {
        let app = TestApp::new().await;
        let user = app.create_user("user1").await;
        store_attachment(
            &app,
            user.id,
            Attachment {
                key: "htmlkey".to_string(),
                filename: "x.html".to_string(),
                content_type: "text/html".to_string(),
            },
        )
        .await;

        let response = app
            .send(app.request(Method::GET, "/media/htmlkey/x.html").body_empty())
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            response.headers[CONTENT_DISPOSITION],
            "attachment; filename=\"x.html\""
        );
        assert_eq!(response.headers[X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[tokio::test]
    async fn unknown_key_or_wrong_filename_is_404() {
        let app = TestApp::new().await;
        tweet_with_image(&app).await;

        for uri in ["/media/nokey/test.png", "/media/somekey/other.png"] {
            let response = app.send(app.request(Method::GET, uri).body_empty()).await;
            assert_eq!(response.status, StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[tokio::test]
    async fn missing_blob_is_404() {
        let app = TestApp::new().await;
        let image = tweet_with_image(&app).await;
        app.state.storage.delete(&image.key).await.unwrap();

        let response = app
            .send(app.request(Method::GET, "/media/somekey/test.png").body_empty())
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }
}
