//! 토큰 endpoint.
//!
//! `POST /token/refresh` (공개). 본문의 리프레시 토큰이 저장된 값과 같을 때만
//! 새 토큰 쌍을 발급하고 이전 값을 교체합니다.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use super::validated;
use crate::auth::TokenPair;
use crate::error::AuthError;
use crate::state::AppState;

/// 토큰 갱신 요청.
#[derive(Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// 토큰 갱신.
///
/// POST /token/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, AuthError> {
    let request = validated(payload)?;
    let pair = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

/// 토큰 라우터 생성.
pub fn token_router() -> Router<Arc<AppState>> {
    Router::new().route("/refresh", post(refresh))
}
