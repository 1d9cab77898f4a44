//! 역할 조회.
//!
//! 역할 이름은 대소문자를 구분해 정확히 일치할 때만 같다고 봅니다.

use std::collections::HashSet;
use std::sync::Arc;
use warden_core::{RoleRepository, StoreError, UserRepository};

/// 사용자명을 역할 집합으로 변환합니다.
#[derive(Clone)]
pub struct RoleResolver {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
}

impl RoleResolver {
    pub fn new(users: Arc<dyn UserRepository>, roles: Arc<dyn RoleRepository>) -> Self {
        Self { users, roles }
    }

    /// 사용자에게 할당된 역할 집합.
    ///
    /// 사용자가 없으면 `NotFound`입니다.
    pub async fn roles_of(&self, username: &str) -> Result<HashSet<String>, StoreError> {
        let id = self.users.find_id_by_username(username).await?;
        self.roles.roles_of(id).await
    }

    /// 사용자가 역할을 보유하는지 확인합니다.
    ///
    /// 존재하지 않는 사용자는 어떤 역할도 보유하지 않은 것으로 봅니다.
    pub async fn holds(&self, username: &str, role: &str) -> Result<bool, StoreError> {
        match self.roles_of(username).await {
            Ok(roles) => Ok(roles.contains(role)),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;
    use warden_core::NewUser;

    #[tokio::test]
    async fn test_role_names_are_case_sensitive() {
        let store = Arc::new(MemoryStore::new("user"));
        store.create(&NewUser::new("alice", "alice@example.com"), "hash").await.unwrap();
        store.assign("alice", "admin").await.unwrap();

        let resolver = RoleResolver::new(store.clone(), store.clone());
        assert!(resolver.holds("alice", "admin").await.unwrap());
        assert!(!resolver.holds("alice", "Admin").await.unwrap());
        assert!(!resolver.holds("alice", "user").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_holds_nothing() {
        let store = Arc::new(MemoryStore::new("user"));
        let resolver = RoleResolver::new(store.clone(), store);

        assert!(!resolver.holds("ghost", "admin").await.unwrap());
        assert!(matches!(
            resolver.roles_of("ghost").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_role_set() {
        let store = Arc::new(MemoryStore::new("user"));
        store.create(&NewUser::new("bob", "bob@example.com"), "hash").await.unwrap();
        let resolver = RoleResolver::new(store.clone(), store);

        assert!(resolver.roles_of("bob").await.unwrap().is_empty());
    }
}
