//! 사용자 endpoint.
//!
//! - `POST /user/login` (공개)
//! - `POST /user/register` (공개)
//! - `POST /user/logout/{user_id}`

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
use warden_core::NewUser;

use super::validated;
use crate::auth::{AuthenticatedUser, TokenPair};
use crate::error::AuthError;
use crate::state::AppState;

/// 로그인 요청.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// 회원가입 요청.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub country: Option<String>,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl RegisterRequest {
    /// 프로필과 평문 비밀번호로 분리합니다.
    pub fn into_parts(self) -> (NewUser, String) {
        (
            NewUser {
                username: self.username,
                email: self.email,
                country: self.country,
                phone: self.phone,
            },
            self.password,
        )
    }
}

/// 메시지 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 로그인.
///
/// POST /user/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AuthError> {
    let request = validated(payload)?;
    let pair = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(pair))
}

/// 회원가입.
///
/// POST /user/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    let (user, password) = validated(payload)?.into_parts();
    state.auth.register(user, &password).await?;
    Ok(Json(MessageResponse::new("User successfully created")))
}

/// 로그아웃.
///
/// POST /user/logout/{user_id}
pub async fn logout(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.logout(&caller, &user_id).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// 사용자 라우터 생성.
pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout/{user_id}", post(logout))
}
