//! Authentication and session management endpoints

use axum::{
    Json, Router,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::{HeaderMap, request::Parts},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::dto::SuccessResponse;
use crate::AppState;
use crate::domain::{sessions, users, users::User};
use crate::services::{
    cookies,
    error::{ApiError, LogErr},
    passwords, session,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(login).delete(logout))
        .route("/authenticated", get(authenticated))
}

// ============================================================================
// Extractors - resolve the signed session cookie to a user
// ============================================================================

/// The logged-in user, if any. Never rejects for a missing session.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = session::resolve_user(&state.db, &parts.headers, &state.cookie_key)
            .await
            .log_500("Resolve session error")?;
        Ok(CurrentUser(user))
    }
}

/// The logged-in user; rejects with 401 when there is none
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or(ApiError::Unauthenticated)
    }
}

// ============================================================================
// Session endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: LoginParams,
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

/// POST /sessions - Log in and set the signed session cookie
async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, Json<SuccessResponse>), ApiError> {
    let Json(req) = payload?;
    let LoginParams { username, password } = req.user;

    let Some(user) = users::get_user_by_username(&state.db, &username)
        .await
        .log_500("Get user by username error")?
    else {
        tracing::warn!(%username, "Login for unknown user");
        return Err(ApiError::InvalidCredentials);
    };

    let valid = passwords::verify_password(password, user.password_digest.clone())
        .await
        .log_500("Verify password error")?;
    if !valid {
        tracing::warn!(%username, "Failed login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let new_session = sessions::create_session(&state.db, user.id)
        .await
        .log_500("Create session error")?;

    tracing::info!(user_id = new_session.user_id, session_id = new_session.id, "User logged in");

    let jar = SignedCookieJar::<Key>::from_headers(&headers, state.cookie_key.clone())
        .add(cookies::build_session_cookie(new_session.token, &state.config));

    Ok((jar, Json(SuccessResponse::new(true))))
}

/// DELETE /sessions - Destroy the current session and clear the cookie
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(SignedCookieJar, Json<SuccessResponse>), ApiError> {
    let jar: SignedCookieJar = SignedCookieJar::from_headers(&headers, state.cookie_key.clone());

    let destroyed = match session::session_token(&headers, &state.cookie_key) {
        Some(token) => sessions::delete_session(&state.db, &token)
            .await
            .log_500("Delete session error")?,
        None => false,
    };

    if destroyed {
        tracing::info!("User logged out");
    }

    let jar = jar.remove(cookies::build_clear_session_cookie());
    Ok((jar, Json(SuccessResponse::new(destroyed))))
}

#[derive(Debug, Serialize)]
struct AuthenticatedResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
}

/// GET /authenticated - Report whether the session cookie names a user
async fn authenticated(CurrentUser(user): CurrentUser) -> Json<AuthenticatedResponse> {
    Json(AuthenticatedResponse {
        authenticated: user.is_some(),
        username: user.map(|u| u.username),
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{BuilderExt, TestApp};
    use axum::http::{Method, StatusCode, header::COOKIE, header::SET_COOKIE};
    use serde_json::json;

    #[tokio::test]
    async fn login_sets_signed_cookie_that_authenticates() {
        let app = TestApp::new().await;
        app.signup("user1", "password1").await;

        let response = app
            .send(app.json_request(
                Method::POST,
                "/sessions",
                json!({ "user": { "username": "user1", "password": "password1" } }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), json!({ "success": true }));

        let set_cookie = response.headers[SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.starts_with("twitter_session_token="));
        assert!(set_cookie.contains("HttpOnly"));

        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let response = app
            .send(app.request(Method::GET, "/authenticated").header(COOKIE, cookie).body_empty())
            .await;
        assert_eq!(
            response.json(),
            json!({ "authenticated": true, "username": "user1" })
        );
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = TestApp::new().await;
        app.signup("user1", "password1").await;

        let response = app
            .send(app.json_request(
                Method::POST,
                "/sessions",
                json!({ "user": { "username": "user1", "password": "wrong-password" } }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.json(), json!({ "success": false }));
        assert!(response.headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_rejected() {
        let app = TestApp::new().await;
        let response = app
            .send(app.json_request(
                Method::POST,
                "/sessions",
                json!({ "user": { "username": "ghost", "password": "password1" } }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_login_keeps_error_shape() {
        let app = TestApp::new().await;
        let response = app
            .send(app.json_request(
                Method::POST,
                "/sessions",
                json!({ "user": { "username": "user1" } }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json()["success"], json!(false));
        assert!(response.headers.get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn anonymous_is_not_authenticated() {
        let app = TestApp::new().await;
        let response = app
            .send(app.request(Method::GET, "/authenticated").body_empty())
            .await;
        assert_eq!(response.json(), json!({ "authenticated": false }));
    }

    #[tokio::test]
    async fn logout_destroys_session() {
        let app = TestApp::new().await;
        let user = app.create_user("user1").await;
        let cookie = app.session_cookie(&user).await;

        let response = app
            .send(
                app.request(Method::DELETE, "/sessions")
                    .header(COOKIE, cookie.clone())
                    .body_empty(),
            )
            .await;
        assert_eq!(response.json(), json!({ "success": true }));
        let cleared = response.headers[SET_COOKIE].to_str().unwrap();
        assert!(cleared.starts_with("twitter_session_token="));
        assert!(cleared.contains("Max-Age=0"));

        // The old cookie no longer resolves to anyone.
        let response = app
            .send(app.request(Method::GET, "/authenticated").header(COOKIE, cookie).body_empty())
            .await;
        assert_eq!(response.json(), json!({ "authenticated": false }));
    }

    #[tokio::test]
    async fn logout_without_session_reports_failure() {
        let app = TestApp::new().await;
        let response = app
            .send(app.request(Method::DELETE, "/sessions").body_empty())
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.json(), json!({ "success": false }));
    }
}
