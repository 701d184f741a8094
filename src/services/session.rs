//! Session resolution: signed cookie -> session token -> user
//!
//! Verification and lookup are separate steps. A cookie whose signature does not
//! check out is treated exactly like a missing cookie.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{CookieJar, Key, SignedCookieJar};
use sqlx::SqlitePool;

use super::cookies::config::SESSION_TOKEN_NAME;
use crate::domain::{sessions, users::User};

/// Extract the verified session token from the request cookies
pub fn session_token(headers: &HeaderMap, key: &Key) -> Option<String> {
    let jar: SignedCookieJar = SignedCookieJar::from_headers(headers, key.clone());
    if let Some(cookie) = jar.get(SESSION_TOKEN_NAME) {
        return Some(cookie.value().to_string());
    }

    if CookieJar::from_headers(headers).get(SESSION_TOKEN_NAME).is_some() {
        tracing::warn!("Session cookie failed signature verification");
    }
    None
}

/// Resolve the logged-in user, or `None` if the cookie is absent, unsigned or unknown
pub async fn resolve_user(
    db: &SqlitePool,
    headers: &HeaderMap,
    key: &Key,
) -> Result<Option<User>, sqlx::Error> {
    let Some(token) = session_token(headers, key) else {
        return Ok(None);
    };
    sessions::find_user_by_token(db, &token).await
}

/// Cookie header value carrying `token` signed with `key`, as a browser would send it
#[cfg(test)]
pub(crate) fn signed_cookie_header(key: &Key, token: &str) -> axum::http::HeaderValue {
    use axum::http::header::SET_COOKIE;
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::Cookie;

    let jar = SignedCookieJar::<Key>::new(key.clone())
        .add(Cookie::new(SESSION_TOKEN_NAME, token.to_string()));
    let response = (jar, ()).into_response();
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    let pair = set_cookie.split(';').next().unwrap();
    axum::http::HeaderValue::from_str(pair).unwrap()
}
