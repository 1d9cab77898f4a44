//! 통합 API 에러 응답 타입.
//!
//! 모든 실패 응답은 같은 형식을 사용합니다:
//!
//! ```json
//! { "error": { "code": "INVALID_CREDENTIALS", "message": "Invalid username or password" } }
//! ```
//!
//! 클라이언트에는 분류별 일반 메시지만 전달하고, 상세 원인은 서버 로그에만 남깁니다.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use warden_core::StoreError;

/// 에러 응답 본문의 `error` 필드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_TOKEN", "FORBIDDEN")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// 상태 코드와 함께 `{"error": ...}` 응답으로 변환합니다.
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(ApiErrorBody { error: self })).into_response()
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// 에러 응답 본문.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorResponse,
}

/// 요청 단위 인증/관리 작업 에러.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// 알 수 없는 사용자와 틀린 비밀번호를 구분하지 않습니다
    #[error("잘못된 사용자명 또는 비밀번호")]
    InvalidCredentials,

    #[error("유효하지 않은 리프레시 토큰")]
    InvalidRefreshToken,

    #[error("권한이 부족합니다")]
    Forbidden,

    /// 요청 본문 파싱/검증 실패
    #[error("잘못된 요청: {0}")]
    Malformed(String),

    #[error("사용자명 또는 이메일 중복")]
    DuplicateUser,

    #[error("이미 할당된 역할")]
    RoleAlreadyAssigned,

    #[error("잘못된 사용자 ID: {0}")]
    InvalidUserId(String),

    #[error("사용자를 찾을 수 없음")]
    UserNotFound,

    #[error("사용자 또는 역할을 찾을 수 없음")]
    UserOrRoleNotFound,

    #[error("저장소 에러: {0}")]
    Storage(#[from] StoreError),

    /// 영향받은 행이 없는 쓰기 등
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl AuthError {
    /// 상태 코드, 에러 코드, 일반 메시지.
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password",
            ),
            AuthError::InvalidRefreshToken => (
                StatusCode::BAD_REQUEST,
                "INVALID_REFRESH_TOKEN",
                "Invalid refresh token",
            ),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied"),
            AuthError::Malformed(_) => (
                StatusCode::BAD_REQUEST,
                "MALFORMED_REQUEST",
                "Invalid request format",
            ),
            AuthError::DuplicateUser => (
                StatusCode::METHOD_NOT_ALLOWED,
                "DUPLICATE_USER",
                "Username or Email already in use",
            ),
            AuthError::RoleAlreadyAssigned => (
                StatusCode::CONFLICT,
                "ROLE_ALREADY_ASSIGNED",
                "Role already assigned",
            ),
            AuthError::InvalidUserId(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_USER_ID", "Invalid user id")
            }
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", "User not found"),
            AuthError::UserOrRoleNotFound => (
                StatusCode::NOT_FOUND,
                "USER_OR_ROLE_NOT_FOUND",
                "User or role not found",
            ),
            AuthError::Storage(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "요청 처리 중 내부 에러");
        } else {
            tracing::debug!(error = %self, code, "요청 거부");
        }

        ApiErrorResponse::new(code, message).into_response_with(status)
    }
}
