//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! Arc로 래핑되어 여러 요청 간에 안전하게 공유됩니다. 요청 처리 경로에는
//! 공유 가변 상태가 없고, 리프레시 슬롯과 역할은 저장소에만 있습니다.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use warden_core::{
    AppConfig, Clock, RefreshTokenStore, RoleConfig, RoleRepository, StoreError, UserRepository,
    WardenError, WardenResult,
};

use crate::auth::{AuthGate, CredentialVerifier, GatePolicy, RoleResolver, TokenCodec};
use crate::repository::{MemoryStore, PgStore};
use crate::service::AuthService;

/// 저장소 협력자 묶음.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    /// 사람이 읽을 수 있는 백엔드 이름 (헬스 체크용)
    pub backend: &'static str,
}

impl Stores {
    /// 세 역할을 모두 구현하는 저장소 하나로 묶습니다.
    pub fn shared<T>(store: Arc<T>, backend: &'static str) -> Self
    where
        T: UserRepository + RoleRepository + RefreshTokenStore + 'static,
    {
        Self {
            users: store.clone(),
            roles: store.clone(),
            refresh_tokens: store,
            backend,
        }
    }

    pub fn memory(roles: &RoleConfig) -> Self {
        Self::shared(Arc::new(MemoryStore::from_config(roles)), "memory")
    }

    /// PostgreSQL 저장소. 설정된 기본/상위 역할이 role 테이블에 없으면 등록합니다.
    pub async fn postgres(pool: PgPool, roles: &RoleConfig) -> Result<Self, StoreError> {
        let store = PgStore::new(pool, roles.default_role.clone());
        store
            .ensure_roles(&[roles.default_role.as_str(), roles.elevated_role.as_str()])
            .await?;
        Ok(Self::shared(Arc::new(store), "postgres"))
    }
}

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 로그인/가입/토큰/관리 흐름
    pub auth: Arc<AuthService>,

    /// 요청 인증 게이트
    pub gate: Arc<AuthGate>,

    /// 데이터베이스 연결 풀 (PostgreSQL 사용 시)
    pub db_pool: Option<PgPool>,

    /// 저장소 백엔드 이름
    pub storage_backend: &'static str,

    /// API 접두 경로 (예: "/api/v1")
    pub api_base: String,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 설정과 저장소로 상태를 구성합니다.
    pub fn new(config: &AppConfig, stores: Stores, clock: Arc<dyn Clock>) -> WardenResult<Self> {
        let codec = Arc::new(TokenCodec::from_config(&config.jwt, clock)?);
        let credentials = Arc::new(
            CredentialVerifier::new(&config.password)
                .map_err(|e| WardenError::Config(e.to_string()))?,
        );

        let api_base = config.api.base_path();
        let gate = AuthGate::new(
            codec.clone(),
            RoleResolver::new(stores.users.clone(), stores.roles.clone()),
            GatePolicy::new(&api_base, config.roles.elevated_role.clone()),
        );
        let auth = AuthService::new(
            stores.users,
            stores.roles,
            stores.refresh_tokens,
            codec,
            credentials,
            config.roles.elevated_role.clone(),
        );

        Ok(Self {
            auth: Arc::new(auth),
            gate: Arc::new(gate),
            db_pool: None,
            storage_backend: stores.backend,
            api_base,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// 데이터베이스 풀 설정 (헬스 체크용).
    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

/// 테스트용 상태 생성 (메모리 저장소, 낮은 해시 비용, 시스템 시계).
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use warden_core::{JwtConfig, PasswordConfig, SystemClock};

    let config = AppConfig {
        jwt: JwtConfig::default().with_secret("test-secret-key-for-jwt-testing-minimum-32-chars"),
        password: PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..Default::default()
    };

    match AppState::new(&config, Stores::memory(&config.roles), Arc::new(SystemClock)) {
        Ok(state) => state,
        Err(e) => panic!("테스트 상태 생성 실패: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{JwtConfig, PasswordConfig, SystemClock};

    #[test]
    fn test_state_from_default_config() {
        let config = AppConfig {
            jwt: JwtConfig::default().with_secret("state-test-secret"),
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..Default::default()
        };
        let state = AppState::new(
            &config,
            Stores::memory(&config.roles),
            Arc::new(SystemClock),
        )
        .unwrap();

        assert_eq!(state.api_base, "/api/v1");
        assert_eq!(state.storage_backend, "memory");
        assert!(state.db_pool.is_none());
        assert!(state.uptime_secs() >= 0);
    }
}
