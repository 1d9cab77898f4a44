//! PostgreSQL 저장소.
//!
//! 사용자, 역할, 리프레시 토큰 슬롯을 모두 담당합니다. 조회 키는 항상
//! 사용자명이며, 아직 알 수 없는 ID로 쓰기를 하지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use warden_core::{
    NewUser, RefreshTokenStore, RoleRepository, StoreError, UserId, UserIdentity, UserRepository,
};

// ================================================================================================
// Types
// ================================================================================================

/// users 테이블 레코드
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: i64,
    username: String,
    email: String,
    hashed_password: String,
    #[sqlx(default)]
    country: Option<String>,
    #[sqlx(default)]
    phone: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserIdentity {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            password_hash: record.hashed_password,
            country: record.country,
            phone: record.phone,
            created_at: record.created_at,
        }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

/// 내장 마이그레이션을 적용합니다.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// ================================================================================================
// Repository
// ================================================================================================

/// PostgreSQL 저장소.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    default_role: String,
}

impl PgStore {
    pub fn new(pool: PgPool, default_role: impl Into<String>) -> Self {
        Self {
            pool,
            default_role: default_role.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 역할 이름을 등록합니다. 이미 있는 이름은 건너뜁니다.
    ///
    /// 마이그레이션은 "user"와 "admin"만 넣으므로, 설정에서 다른 이름을 쓰면
    /// 시작 시 이 함수로 등록해야 할당할 수 있습니다.
    pub async fn ensure_roles(&self, names: &[&str]) -> Result<(), StoreError> {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO role (name)
            SELECT UNNEST($1::text[])
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&names)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn find_by_username(&self, username: &str) -> Result<UserIdentity, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, username, email, hashed_password, country, phone, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .map(UserIdentity::from)
        .ok_or(StoreError::NotFound)
    }

    async fn find_username_by_id(&self, id: UserId) -> Result<String, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)
    }

    async fn find_id_by_username(&self, username: &str) -> Result<UserId, StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, user: &NewUser, password_hash: &str) -> Result<UserId, StoreError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (username, hashed_password, email, country, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(password_hash)
        .bind(&user.email)
        .bind(&user.country)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    /// 트랜잭션으로 역할, 토큰 슬롯, 사용자 순서로 삭제합니다.
    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query("DELETE FROM user_role WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        sqlx::query("DELETE FROM user_auth WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?
            .rows_affected();

        if deleted == 0 {
            // tx는 drop 시 롤백
            return Err(StoreError::NotFound);
        }

        tx.commit().await.map_err(store_error)
    }
}

#[async_trait]
impl RoleRepository for PgStore {
    async fn roles_of(&self, id: UserId) -> Result<HashSet<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM role r
            JOIN user_role ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(names.into_iter().collect())
    }

    async fn assign(&self, username: &str, role: &str) -> Result<(), StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_role (user_id, role_id)
            SELECT u.id, r.id
            FROM users u, role r
            WHERE u.username = $1 AND r.name = $2
            "#,
        )
        .bind(username)
        .bind(role)
        .execute(&self.pool)
        .await
        .map_err(store_error)?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn assign_default_role(&self, username: &str) -> Result<(), StoreError> {
        self.assign(username, &self.default_role).await
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn store(&self, username: &str, token: &str) -> Result<bool, StoreError> {
        let affected = sqlx::query(
            r#"
            INSERT INTO user_auth (user_id, refresh_token, updated_at)
            SELECT id, $2, NOW() FROM users WHERE username = $1
            ON CONFLICT (user_id)
            DO UPDATE SET refresh_token = EXCLUDED.refresh_token, updated_at = NOW()
            "#,
        )
        .bind(username)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(store_error)?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn retrieve(&self, username: &str) -> Result<String, StoreError> {
        sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT ua.refresh_token
            FROM user_auth ua
            JOIN users u ON u.id = ua.user_id
            WHERE u.username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?
        .flatten()
        .ok_or(StoreError::NotFound)
    }

    /// 조건부 UPDATE 한 문장으로 비교와 교체를 수행합니다.
    async fn rotate(
        &self,
        username: &str,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE user_auth
            SET refresh_token = $3, updated_at = NOW()
            WHERE user_id = (SELECT id FROM users WHERE username = $1)
              AND refresh_token = $2
            "#,
        )
        .bind(username)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await
        .map_err(store_error)?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn revoke(&self, username: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE user_auth
            SET refresh_token = NULL, updated_at = NOW()
            WHERE user_id = (SELECT id FROM users WHERE username = $1)
            "#,
        )
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }
}
