//! 서비스 공통 에러 타입.

use thiserror::Error;

use crate::domain::StoreError;

/// 핵심 서비스 에러.
#[derive(Debug, Error)]
pub enum WardenError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(#[from] StoreError),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for WardenError {
    fn from(err: config::ConfigError) -> Self {
        WardenError::Config(err.to_string())
    }
}

impl WardenError {
    /// 시작 시점에 발생하는 설정 문제인지 확인합니다.
    pub fn is_config(&self) -> bool {
        matches!(self, WardenError::Config(_))
    }
}

/// WardenError를 사용하는 Result 타입 별칭.
pub type WardenResult<T> = Result<T, WardenError>;
