pub mod auth;
pub mod dto;
pub mod media;
pub mod tweets;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Maximum request body size; bounds image uploads (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(users::routes())
        .merge(tweets::routes())
        .merge(media::routes())
}

/// Routes plus middleware, bound to state
pub fn build_router(state: Arc<AppState>) -> Router {
    build_routes()
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
