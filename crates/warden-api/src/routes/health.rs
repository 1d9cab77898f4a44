//! 헬스 체크 endpoint.
//!
//! 인증 게이트 밖에 있으며 로드밸런서/오케스트레이터가 호출합니다.
//!
//! - `GET /health`: 프로세스 생존 여부
//! - `GET /health/ready`: 저장소 연결까지 확인, 데이터베이스 장애 시 503

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 전체 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Healthy,
    Degraded,
}

/// 컴포넌트 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    NotConfigured,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: ComponentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentStatus {
    fn new(status: ComponentState, detail: Option<String>) -> Self {
        Self { status, detail }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// PostgreSQL 풀 (메모리 저장소면 not_configured)
    pub database: ComponentStatus,
    /// 사용자/역할/리프레시 토큰 저장소. detail은 백엔드 이름
    pub storage: ComponentStatus,
}

/// `/health/ready` 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: Readiness,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /health/ready
pub async fn health_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match &state.db_pool {
        None => ComponentStatus::new(ComponentState::NotConfigured, None),
        Some(_) if state.is_db_healthy().await => ComponentStatus::new(ComponentState::Up, None),
        Some(_) => ComponentStatus::new(
            ComponentState::Down,
            Some("connection failed".to_string()),
        ),
    };

    let degraded = database.status == ComponentState::Down;
    let storage = ComponentStatus::new(
        if degraded {
            ComponentState::Down
        } else {
            ComponentState::Up
        },
        Some(state.storage_backend.to_string()),
    );

    let (code, readiness) = if degraded {
        (StatusCode::SERVICE_UNAVAILABLE, Readiness::Degraded)
    } else {
        (StatusCode::OK, Readiness::Healthy)
    };

    let body = HealthResponse {
        status: readiness,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth { database, storage },
    };

    (code, Json(body))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
