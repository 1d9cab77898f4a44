//! # Warden Core
//!
//! 인증/인가 서비스의 핵심 도메인 모델과 협력자 계약을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 공유되는 기본 타입을 제공합니다:
//! - 사용자 식별 정보와 신규 사용자 입력
//! - 저장소 협력자 트레이트 (사용자, 역할, 리프레시 토큰)
//! - 주입 가능한 시계
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
