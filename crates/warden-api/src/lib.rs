//! 인증/인가 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 자격 증명 검증 (Argon2id)
//! - 서명된 액세스/리프레시 토큰 발급과 검증
//! - 리프레시 토큰 회전과 폐기
//! - 경로 기반 인증 게이트와 역할 확인
//! - PostgreSQL 및 메모리 저장소
//!
//! # 모듈 구성
//!
//! - [`auth`]: 비밀번호, 토큰, 역할 조회, 인증 게이트
//! - [`service`]: 로그인/가입/갱신/로그아웃/관리 흐름
//! - [`repository`]: 저장소 구현
//! - [`routes`]: REST API 엔드포인트
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`error`]: 통합 에러 응답

pub mod auth;
pub mod error;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;

pub use auth::{AuthGate, AuthenticatedUser, Claims, CredentialVerifier, TokenCodec, TokenPair};
pub use error::{ApiErrorBody, ApiErrorResponse, AuthError};
pub use routes::create_router;
pub use service::AuthService;
pub use state::{AppState, Stores};
