//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/{version}/user` - 로그인, 회원가입, 로그아웃
//! - `/api/{version}/token` - 리프레시 토큰 회전
//! - `/api/{version}/admin` - 사용자 추가/삭제, 역할 할당 (상위 역할 필요)
//!
//! 헬스 체크를 제외한 모든 경로는 인증 게이트를 거칩니다.

pub mod admin;
pub mod health;
pub mod token;
pub mod user;

pub use admin::{admin_router, AddUserRequest, AssignRoleRequest};
pub use health::{
    health_router, ComponentHealth, ComponentState, ComponentStatus, HealthResponse, Readiness,
};
pub use token::{token_router, RefreshRequest};
pub use user::{user_router, LoginRequest, MessageResponse, RegisterRequest};

use axum::{extract::rejection::JsonRejection, middleware, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use validator::Validate;

use crate::auth::auth_gate_middleware;
use crate::error::AuthError;
use crate::state::AppState;

/// 전체 라우터 생성.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/user", user_router())
        .nest("/token", token_router())
        .nest("/admin", admin_router());

    Router::new()
        .nest(&state.api_base, api)
        // 이 시점까지 등록된 API 라우트에만 게이트 적용
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            auth_gate_middleware,
        ))
        .nest("/health", health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON 본문을 파싱하고 검증합니다. 실패는 모두 `Malformed`입니다.
pub(crate) fn validated<T: Validate>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, AuthError> {
    let Json(body) = payload.map_err(|e| AuthError::Malformed(e.body_text()))?;
    body.validate()
        .map_err(|e| AuthError::Malformed(e.to_string()))?;
    Ok(body)
}
