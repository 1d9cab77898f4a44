//! 요청 인증 게이트.
//!
//! [`AuthGate::evaluate`]는 경로와 Authorization 헤더만으로 허용/거부를 결정하며
//! 웹 프레임워크에 의존하지 않습니다. [`auth_gate_middleware`]는 이를 Axum에
//! 연결하는 얇은 어댑터입니다.
//!
//! 판정 순서 (요청당 한 번, 재시도 없음):
//! 1. 공개 경로 → 허용
//! 2. `Authorization: Bearer <token>` 형식이 아니면 → 401
//! 3. 액세스 토큰 검증 실패 → 401 (사유는 서버 로그에만)
//! 4. 관리자 경로에서 상위 역할이 없으면 → 403, 저장소 장애 → 500
//! 5. 그 외 → 허용

use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, warn};
use warden_core::StoreError;

use super::roles::RoleResolver;
use super::token::{TokenCodec, TokenKind};
use crate::error::ApiErrorResponse;

/// 경로 분류 규칙.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    public_paths: Vec<String>,
    admin_prefix: String,
    elevated_role: String,
}

impl GatePolicy {
    /// API 기본 경로(예: "/api/v1") 기준 정책을 생성합니다.
    pub fn new(base_path: &str, elevated_role: impl Into<String>) -> Self {
        let base = base_path.trim_end_matches('/');
        Self {
            public_paths: vec![
                format!("{}/user/login", base),
                format!("{}/user/register", base),
                format!("{}/token/refresh", base),
            ],
            admin_prefix: format!("{}/admin/", base),
            elevated_role: elevated_role.into(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize(path);
        self.public_paths.iter().any(|public| public == path)
    }

    /// 관리자 경로 여부. 접두 경로 아래의 모든 경로가 해당됩니다.
    pub fn requires_elevated_role(&self, path: &str) -> bool {
        path.starts_with(&self.admin_prefix)
    }

    pub fn elevated_role(&self) -> &str {
        &self.elevated_role
    }
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// `Bearer <token>` 형식에서 토큰을 꺼냅니다. 정확히 두 부분이어야 합니다.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// 인증된 호출자.
///
/// 게이트를 통과한 요청의 extensions에 들어가며 핸들러에서 추출기로 사용합니다.
///
/// ```rust,ignore
/// async fn handler(caller: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}!", caller.username)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// 게이트 판정 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// 공개 경로
    Public,
    /// 인증된 요청
    Authenticated(AuthenticatedUser),
}

/// 게이트 거부 사유.
#[derive(Debug, thiserror::Error)]
pub enum GateRejection {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    /// 구체적인 사유는 클라이언트에 노출하지 않습니다
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("권한이 부족합니다")]
    Forbidden,
    #[error("역할 조회 실패: {0}")]
    Internal(#[from] StoreError),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GateRejection::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                "Authorization header is required",
            ),
            GateRejection::InvalidAuthHeader => (
                StatusCode::UNAUTHORIZED,
                "INVALID_AUTH_HEADER",
                "Invalid authorization header format",
            ),
            GateRejection::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "Invalid token")
            }
            GateRejection::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied"),
            GateRejection::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        };

        ApiErrorResponse::new(code, message).into_response_with(status)
    }
}

/// 인증 게이트.
#[derive(Debug, Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    resolver: RoleResolver,
    policy: GatePolicy,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>, resolver: RoleResolver, policy: GatePolicy) -> Self {
        Self {
            codec,
            resolver,
            policy,
        }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// 요청 하나를 판정합니다.
    pub async fn evaluate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<GateDecision, GateRejection> {
        if self.policy.is_public(path) {
            return Ok(GateDecision::Public);
        }

        let header = authorization.ok_or_else(|| {
            warn!(path, "Authorization 헤더 없음");
            GateRejection::MissingToken
        })?;

        let token = bearer_token(header).ok_or_else(|| {
            warn!(path, "Bearer 형식이 아닌 Authorization 헤더");
            GateRejection::InvalidAuthHeader
        })?;

        let claims = self
            .codec
            .validate(token, TokenKind::Access)
            .map_err(|e| {
                warn!(path, reason = e.reason(), error = %e, "액세스 토큰 검증 실패");
                GateRejection::InvalidToken
            })?;

        if self.policy.requires_elevated_role(path) {
            let role = self.policy.elevated_role();
            let allowed = self.resolver.holds(&claims.sub, role).await.map_err(|e| {
                error!(path, username = %claims.sub, error = %e, "역할 조회 실패");
                GateRejection::Internal(e)
            })?;

            if !allowed {
                warn!(path, username = %claims.sub, role, "관리자 경로 접근 거부");
                return Err(GateRejection::Forbidden);
            }
        }

        let expires_at = claims.expires_at();
        Ok(GateDecision::Authenticated(AuthenticatedUser {
            username: claims.sub,
            expires_at,
        }))
    }
}

/// Axum 미들웨어 어댑터.
///
/// 중첩 라우터에서도 전체 경로로 판정하도록 [`OriginalUri`]를 우선 사용합니다.
pub async fn auth_gate_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    // UTF-8이 아닌 헤더는 형식 오류로 취급
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default().to_string());

    match gate.evaluate(&path, authorization.as_deref()).await {
        Ok(GateDecision::Public) => next.run(request).await,
        Ok(GateDecision::Authenticated(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(GateRejection::MissingToken)
    }
}
