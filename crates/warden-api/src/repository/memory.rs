//! 메모리 저장소.
//!
//! 모든 테이블을 하나의 `RwLock` 뒤에 둡니다. 각 쓰기는 잠금을 한 번만 잡으므로
//! SQL 단일 문장과 같은 원자성을 가집니다.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use warden_core::{
    NewUser, RefreshTokenStore, RoleConfig, RoleRepository, StoreError, UserId, UserIdentity,
    UserRepository,
};

/// 마이그레이션이 미리 넣어 두는 역할과 같은 목록.
const SEEDED_ROLES: &[&str] = &["user", "admin"];

#[derive(Debug, Default)]
struct Tables {
    next_id: UserId,
    users: HashMap<UserId, UserIdentity>,
    roles: HashSet<String>,
    user_roles: HashMap<UserId, HashSet<String>>,
    refresh_tokens: HashMap<UserId, Option<String>>,
}

impl Tables {
    fn id_of(&self, username: &str) -> Option<UserId> {
        self.users
            .values()
            .find(|user| user.username == username)
            .map(|user| user.id)
    }
}

/// 메모리 저장소.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    default_role: String,
}

impl MemoryStore {
    /// 기본 역할과 시드 역할("user", "admin")이 등록된 빈 저장소를 생성합니다.
    pub fn new(default_role: impl Into<String>) -> Self {
        let default_role = default_role.into();
        let mut roles: HashSet<String> = SEEDED_ROLES.iter().map(|r| r.to_string()).collect();
        roles.insert(default_role.clone());

        Self {
            tables: RwLock::new(Tables {
                next_id: 1,
                roles,
                ..Default::default()
            }),
            default_role,
        }
    }

    /// 역할 설정의 기본/상위 역할을 모두 등록한 저장소를 생성합니다.
    pub fn from_config(config: &RoleConfig) -> Self {
        Self::new(config.default_role.clone()).with_role(config.elevated_role.clone())
    }

    /// 할당 가능한 역할을 추가합니다.
    pub fn with_role(mut self, name: impl Into<String>) -> Self {
        self.tables.get_mut().roles.insert(name.into());
        self
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .any(|user| user.username == username || user.email == email))
    }

    async fn find_by_username(&self, username: &str) -> Result<UserIdentity, StoreError> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_username_by_id(&self, id: UserId) -> Result<String, StoreError> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .map(|user| user.username.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_id_by_username(&self, username: &str) -> Result<UserId, StoreError> {
        self.tables
            .read()
            .await
            .id_of(username)
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, user: &NewUser, password_hash: &str) -> Result<UserId, StoreError> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables
            .users
            .values()
            .find(|u| u.username == user.username || u.email == user.email)
        {
            let field = if existing.username == user.username {
                "username"
            } else {
                "email"
            };
            return Err(StoreError::Conflict(format!("duplicate {}", field)));
        }

        let id = tables.next_id;
        tables.next_id += 1;
        tables.users.insert(
            id,
            UserIdentity {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: password_hash.to_string(),
                country: user.country.clone(),
                phone: user.phone.clone(),
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.user_roles.remove(&id);
        tables.refresh_tokens.remove(&id);

        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn roles_of(&self, id: UserId) -> Result<HashSet<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.user_roles.get(&id).cloned().unwrap_or_default())
    }

    async fn assign(&self, username: &str, role: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        let id = tables.id_of(username).ok_or(StoreError::NotFound)?;
        if !tables.roles.contains(role) {
            return Err(StoreError::NotFound);
        }

        if !tables.user_roles.entry(id).or_default().insert(role.to_string()) {
            return Err(StoreError::Conflict(format!(
                "role {} already assigned",
                role
            )));
        }

        Ok(())
    }

    async fn assign_default_role(&self, username: &str) -> Result<(), StoreError> {
        self.assign(username, &self.default_role).await
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn store(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        match tables.id_of(username) {
            Some(id) => {
                tables.refresh_tokens.insert(id, Some(token.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn retrieve(&self, username: &str) -> Result<String, StoreError> {
        let tables = self.tables.read().await;

        tables
            .id_of(username)
            .and_then(|id| tables.refresh_tokens.get(&id))
            .and_then(|slot| slot.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn rotate(
        &self,
        username: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(id) = tables.id_of(username) else {
            return Ok(false);
        };
        match tables.refresh_tokens.get_mut(&id) {
            Some(slot) if slot.as_deref() == Some(expected) => {
                *slot = Some(replacement.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, username: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;

        if let Some(id) = tables.id_of(username) {
            if let Some(slot) = tables.refresh_tokens.get_mut(&id) {
                *slot = None;
            }
        }

        Ok(())
    }
}
