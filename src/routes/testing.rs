//! In-process test harness: full router over an in-memory database and a temp blob root

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header::CONTENT_TYPE, request},
};
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::AppState;
use crate::config::Config;
use crate::domain::{sessions, testing, users, users::User};
use crate::services::{passwords, session::signed_cookie_header};
use crate::storage::BlobStore;

pub const TEST_PASSWORD: &str = "password1";

pub struct TestApp {
    pub state: Arc<AppState>,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub trait BuilderExt {
    fn body_empty(self) -> Request<Body>;
}

impl BuilderExt for request::Builder {
    fn body_empty(self) -> Request<Body> {
        self.body(Body::empty()).unwrap()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.bcrypt_cost = 4;
        config.storage_path = dir.path().join("storage");

        let storage = BlobStore::new(config.storage_path.clone());
        storage.ensure_root().await.unwrap();

        let state = AppState {
            db: testing::pool().await,
            storage,
            cookie_key: Key::generate(),
            config: Arc::new(config),
        };
        Self {
            state: Arc::new(state),
            _dir: dir,
        }
    }

    fn router(&self) -> Router {
        super::build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec();
        TestResponse { status, headers, body }
    }

    pub fn request(&self, method: Method, uri: &str) -> request::Builder {
        Request::builder().method(method).uri(uri)
    }

    pub fn json_request(&self, method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
        self.request(method, uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Register through the API, as a client would
    pub async fn signup(&self, username: &str, password: &str) {
        let response = self
            .send(self.json_request(
                Method::POST,
                "/users",
                serde_json::json!({
                    "user": {
                        "username": username,
                        "email": format!("{}@user.com", username),
                        "password": password,
                    }
                }),
            ))
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    /// Insert a user directly with `TEST_PASSWORD`
    pub async fn create_user(&self, username: &str) -> User {
        let digest = passwords::hash_password(TEST_PASSWORD.to_string(), 4).await.unwrap();
        users::create_user(
            &self.state.db,
            username,
            &format!("{}@user.com", username),
            &digest,
        )
        .await
        .unwrap()
    }

    /// Cookie header for a fresh session belonging to `user`
    pub async fn session_cookie(&self, user: &User) -> HeaderValue {
        let session = sessions::create_session(&self.state.db, user.id).await.unwrap();
        signed_cookie_header(&self.state.cookie_key, &session.token)
    }
}
