//! Account registration (/users)

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::domain::users::{self, CreateUserError, NewUser};
use crate::services::{
    error::{ApiError, LogErr},
    passwords,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(create_user))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user: CreateUserParams,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserParams {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    username: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct CreateUserResponse {
    user: UserResponse,
}

/// POST /users - Register a new account
async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let Json(req) = payload?;
    let new_user = NewUser {
        username: req.user.username,
        email: req.user.email,
        password: req.user.password,
    };
    new_user.validate()?;

    let digest = passwords::hash_password(new_user.password, state.config.bcrypt_cost)
        .await
        .log_500("Hash password error")?;

    let user = match users::create_user(&state.db, &new_user.username, &new_user.email, &digest).await {
        Ok(user) => user,
        Err(CreateUserError::Taken(errors)) => return Err(errors.into()),
        Err(e @ CreateUserError::Db(_)) => {
            tracing::error!("Create user error: {}", e);
            return Err(ApiError::Internal);
        }
    };

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            user: UserResponse {
                username: user.username,
                email: user.email,
            },
        }),
    ))
}
