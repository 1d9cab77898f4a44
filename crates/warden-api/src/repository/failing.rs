//! 장애 주입 저장소 (테스트 전용).
//!
//! [`MemoryStore`]를 감싸고, 켜 둔 연산만 백엔드 장애처럼 실패시킵니다.
//! 스위치는 준비 단계(가입 등)가 끝난 뒤에 켭니다.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use warden_core::{
    NewUser, RefreshTokenStore, RoleRepository, StoreError, UserId, UserIdentity, UserRepository,
};

use super::MemoryStore;

/// 실패시킬 수 있는 연산.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `roles_of`가 백엔드 에러를 반환
    RolesOf,
    /// `store`가 영향받은 행 없음(`Ok(false)`)을 반환
    StoreAffectsNothing,
    /// `revoke`가 백엔드 에러를 반환
    Revoke,
    /// `rotate`가 백엔드 에러를 반환
    Rotate,
}

#[derive(Debug)]
pub struct FailingStore {
    inner: MemoryStore,
    roles_of: AtomicBool,
    store_affects_nothing: AtomicBool,
    revoke: AtomicBool,
    rotate: AtomicBool,
}

impl FailingStore {
    pub fn new(default_role: &str) -> Self {
        Self {
            inner: MemoryStore::new(default_role),
            roles_of: AtomicBool::new(false),
            store_affects_nothing: AtomicBool::new(false),
            revoke: AtomicBool::new(false),
            rotate: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, fault: Fault) {
        self.flag(fault).store(true, Ordering::SeqCst);
    }

    fn flag(&self, fault: Fault) -> &AtomicBool {
        match fault {
            Fault::RolesOf => &self.roles_of,
            Fault::StoreAffectsNothing => &self.store_affects_nothing,
            Fault::Revoke => &self.revoke,
            Fault::Rotate => &self.rotate,
        }
    }

    fn tripped(&self, fault: Fault) -> bool {
        self.flag(fault).load(Ordering::SeqCst)
    }
}

fn backend_down() -> StoreError {
    StoreError::Backend("connection reset by peer".to_string())
}

#[async_trait]
impl UserRepository for FailingStore {
    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        self.inner.exists(username, email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<UserIdentity, StoreError> {
        self.inner.find_by_username(username).await
    }

    async fn find_username_by_id(&self, id: UserId) -> Result<String, StoreError> {
        self.inner.find_username_by_id(id).await
    }

    async fn find_id_by_username(&self, username: &str) -> Result<UserId, StoreError> {
        self.inner.find_id_by_username(username).await
    }

    async fn create(&self, user: &NewUser, password_hash: &str) -> Result<UserId, StoreError> {
        self.inner.create(user, password_hash).await
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl RoleRepository for FailingStore {
    async fn roles_of(&self, id: UserId) -> Result<HashSet<String>, StoreError> {
        if self.tripped(Fault::RolesOf) {
            return Err(backend_down());
        }
        self.inner.roles_of(id).await
    }

    async fn assign(&self, username: &str, role: &str) -> Result<(), StoreError> {
        self.inner.assign(username, role).await
    }

    async fn assign_default_role(&self, username: &str) -> Result<(), StoreError> {
        self.inner.assign_default_role(username).await
    }
}

#[async_trait]
impl RefreshTokenStore for FailingStore {
    async fn store(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        if self.tripped(Fault::StoreAffectsNothing) {
            return Ok(false);
        }
        self.inner.store(username, token).await
    }

    async fn retrieve(&self, username: &str) -> Result<String, StoreError> {
        self.inner.retrieve(username).await
    }

    async fn rotate(
        &self,
        username: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        if self.tripped(Fault::Rotate) {
            return Err(backend_down());
        }
        self.inner.rotate(username, expected, replacement).await
    }

    async fn revoke(&self, username: &str) -> Result<(), StoreError> {
        if self.tripped(Fault::Revoke) {
            return Err(backend_down());
        }
        self.inner.revoke(username).await
    }
}
