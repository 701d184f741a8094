//! Cookie building utilities for session management
//!
//! Centralizes cookie attributes so login and logout stay consistent.

use axum_extra::extract::cookie::Cookie;

use crate::config::Config;

/// Cookie configuration constants
pub mod config {
    /// Signed session token cookie name
    pub const SESSION_TOKEN_NAME: &str = "twitter_session_token";
    /// Path for the session cookie (all routes)
    pub const SESSION_COOKIE_PATH: &str = "/";
}

/// Build the session cookie carrying `token`.
///
/// No Max-Age: the cookie lasts for the browser session, matching the server-side
/// session which only ends at logout.
pub fn build_session_cookie(token: String, settings: &Config) -> Cookie<'static> {
    Cookie::build((config::SESSION_TOKEN_NAME, token))
        .path(config::SESSION_COOKIE_PATH)
        .http_only(true)
        .secure(settings.secure_cookies())
        .same_site(settings.cookie_same_site)
        .build()
}

/// Cookie used to clear the session token (path must match the one it replaces)
pub fn build_clear_session_cookie() -> Cookie<'static> {
    Cookie::build(config::SESSION_TOKEN_NAME)
        .path(config::SESSION_COOKIE_PATH)
        .build()
}
