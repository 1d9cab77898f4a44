//! 인증 및 권한 부여.
//!
//! # 구성 요소
//!
//! - [`CredentialVerifier`]: Argon2 비밀번호 해싱/검증
//! - [`TokenCodec`]: HS256 액세스/리프레시 토큰 발급과 검증
//! - [`RoleResolver`]: 사용자명 → 역할 집합
//! - [`AuthGate`]: 요청 단위 인증/인가 판정과 Axum 어댑터
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! // 게이트를 통과한 요청에서 호출자 추출
//! async fn protected_handler(caller: AuthenticatedUser) -> impl IntoResponse {
//!     format!("Hello, {}!", caller.username)
//! }
//! ```

mod gate;
mod password;
mod roles;
mod token;

pub use gate::{
    auth_gate_middleware, AuthGate, AuthenticatedUser, GateDecision, GatePolicy, GateRejection,
};
pub use password::{CredentialVerifier, PasswordError};
pub use roles::RoleResolver;
pub use token::{Claims, TokenCodec, TokenError, TokenKind, TokenPair};
