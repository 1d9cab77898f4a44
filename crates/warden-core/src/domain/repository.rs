//! 저장소 협력자 트레이트.
//!
//! 인증 서브시스템은 이 트레이트에만 의존합니다. 구현체(PostgreSQL, 메모리)는
//! API 크레이트에 있습니다.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use super::user::{NewUser, UserId, UserIdentity};

/// 저장소 협력자 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 대상 레코드 없음
    #[error("레코드를 찾을 수 없음")]
    NotFound,

    /// 고유 제약 조건 위반
    #[error("중복 레코드: {0}")]
    Conflict(String),

    /// 백엔드 장애
    #[error("저장소 백엔드 에러: {0}")]
    Backend(String),
}

impl StoreError {
    /// NotFound 여부를 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// 사용자 레코드 저장소.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 사용자명 또는 이메일이 이미 사용 중인지 확인합니다.
    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    /// 사용자명으로 사용자를 조회합니다.
    async fn find_by_username(&self, username: &str) -> Result<UserIdentity, StoreError>;

    async fn find_username_by_id(&self, id: UserId) -> Result<String, StoreError>;

    async fn find_id_by_username(&self, username: &str) -> Result<UserId, StoreError>;

    /// 사용자를 생성하고 부여된 ID를 반환합니다.
    async fn create(&self, user: &NewUser, password_hash: &str) -> Result<UserId, StoreError>;

    /// 사용자와 관련 레코드(역할, 리프레시 토큰)를 하나의 단위로 삭제합니다.
    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}

/// 역할 할당 저장소.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// 사용자에게 할당된 역할 이름 집합. 할당이 없으면 빈 집합입니다.
    async fn roles_of(&self, id: UserId) -> Result<HashSet<String>, StoreError>;

    /// 사용자명으로 역할을 할당합니다.
    ///
    /// 멱등하지 않습니다. 이미 할당된 역할은 `Conflict`, 알 수 없는 사용자나
    /// 역할은 `NotFound`입니다.
    async fn assign(&self, username: &str, role: &str) -> Result<(), StoreError>;

    /// 저장소에 설정된 기본 역할을 할당합니다.
    async fn assign_default_role(&self, username: &str) -> Result<(), StoreError>;
}

/// 사용자별 단일 리프레시 토큰 슬롯.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// 슬롯을 덮어씁니다.
    ///
    /// 영향받은 행이 없으면 에러가 아닌 `Ok(false)`를 반환합니다.
    async fn store(&self, username: &str, token: &str) -> Result<bool, StoreError>;

    /// 저장된 토큰. 슬롯이 비어 있으면 `NotFound`입니다.
    async fn retrieve(&self, username: &str) -> Result<String, StoreError>;

    /// 슬롯에 `expected`가 들어 있을 때만 `replacement`로 교체합니다.
    ///
    /// 비교와 교체는 하나의 원자적 단계입니다. 같은 토큰으로 동시에 호출하면
    /// 최대 하나만 `Ok(true)`를 받고, 나머지는 `Ok(false)`입니다.
    async fn rotate(
        &self,
        username: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError>;

    /// 슬롯을 비웁니다. 이미 비어 있어도 성공합니다.
    async fn revoke(&self, username: &str) -> Result<(), StoreError>;
}
