//! 인증 흐름 조정.
//!
//! 핸들러는 요청 파싱만 하고 모든 흐름은 [`AuthService`]를 거칩니다.
//! 비밀번호 해싱/검증은 CPU 비용이 크므로 블로킹 스레드에서 실행합니다.

use std::sync::Arc;
use tracing::{error, info, warn};
use warden_core::{NewUser, RefreshTokenStore, RoleRepository, StoreError, UserId, UserRepository};

use crate::auth::{
    AuthenticatedUser, CredentialVerifier, PasswordError, RoleResolver, TokenCodec, TokenKind,
    TokenPair,
};
use crate::error::AuthError;

/// 인증 서비스.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    resolver: RoleResolver,
    codec: Arc<TokenCodec>,
    credentials: Arc<CredentialVerifier>,
    elevated_role: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("codec", &self.codec)
            .field("elevated_role", &self.elevated_role)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        credentials: Arc<CredentialVerifier>,
        elevated_role: impl Into<String>,
    ) -> Self {
        Self {
            resolver: RoleResolver::new(users.clone(), roles.clone()),
            users,
            roles,
            refresh_tokens,
            codec,
            credentials,
            elevated_role: elevated_role.into(),
        }
    }

    // ============================================================================================
    // Credentials
    // ============================================================================================

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("해싱 작업 실패: {}", e)))?
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn verify_password(
        &self,
        password: String,
        hash: Option<String>,
    ) -> Result<Result<bool, PasswordError>, AuthError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => credentials.verify(&password, &hash),
            None => {
                credentials.verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| AuthError::Internal(format!("검증 작업 실패: {}", e)))
    }

    // ============================================================================================
    // Session
    // ============================================================================================

    /// 로그인.
    ///
    /// 알 수 없는 사용자와 틀린 비밀번호는 같은 에러를 반환하며, 알 수 없는
    /// 사용자에 대해서도 같은 비용의 검증을 수행합니다.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = match self.users.find_by_username(username).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let hash = user.as_ref().map(|u| u.password_hash.clone());
        match self.verify_password(password.to_string(), hash).await? {
            Ok(true) => {}
            Ok(false) => {
                warn!(username, known_user = user.is_some(), "로그인 실패");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(username, error = %e, "저장된 비밀번호 해시가 손상됨");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let pair = self.issue_and_persist(username).await?;
        info!(username, "로그인 성공");
        Ok(pair)
    }

    /// 리프레시 토큰 회전.
    ///
    /// 제시된 토큰이 저장된 값과 정확히 같을 때만 새 쌍으로 교체합니다. 비교와
    /// 교체는 저장소의 원자적 `rotate` 한 번으로 처리되므로, 같은 토큰으로 동시에
    /// 요청해도 최대 하나만 성공합니다.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AuthError> {
        let subject = self.codec.extract_unverified_subject(presented).map_err(|e| {
            warn!(reason = e.reason(), "리프레시 토큰 파싱 실패");
            AuthError::InvalidRefreshToken
        })?;

        let claims = self
            .codec
            .validate(presented, TokenKind::Refresh)
            .map_err(|e| {
                warn!(username = %subject, reason = e.reason(), "리프레시 토큰 검증 실패");
                AuthError::InvalidRefreshToken
            })?;

        let pair = self
            .codec
            .issue_pair(&claims.sub)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let rotated = self
            .refresh_tokens
            .rotate(&claims.sub, presented, &pair.refresh_token)
            .await
            .map_err(|e| {
                error!(username = %claims.sub, error = %e, "리프레시 토큰 교체 실패");
                AuthError::from(e)
            })?;
        if !rotated {
            warn!(username = %claims.sub, "저장된 리프레시 토큰과 불일치");
            return Err(AuthError::InvalidRefreshToken);
        }

        info!(username = %claims.sub, "리프레시 토큰 회전");
        Ok(pair)
    }

    /// 로그아웃.
    ///
    /// 대상 사용자의 리프레시 토큰 슬롯을 비웁니다. 발급된 액세스 토큰은
    /// 만료될 때까지 유효합니다. 호출자 본인이거나 상위 역할이어야 합니다.
    pub async fn logout(&self, caller: &AuthenticatedUser, user_id: &str) -> Result<(), AuthError> {
        let id = parse_user_id(user_id)?;
        let username = match self.users.find_username_by_id(id).await {
            Ok(username) => username,
            Err(StoreError::NotFound) => {
                warn!(user_id = id, "로그아웃 대상 사용자 없음");
                return Err(AuthError::InvalidUserId(user_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if caller.username != username
            && !self.resolver.holds(&caller.username, &self.elevated_role).await?
        {
            warn!(caller = %caller.username, target = %username, "다른 사용자 로그아웃 거부");
            return Err(AuthError::Forbidden);
        }

        self.refresh_tokens.revoke(&username).await.map_err(|e| {
            error!(username = %username, error = %e, "리프레시 토큰 폐기 실패");
            AuthError::from(e)
        })?;

        info!(username = %username, caller = %caller.username, "로그아웃");
        Ok(())
    }

    async fn issue_and_persist(&self, username: &str) -> Result<TokenPair, AuthError> {
        let pair = self
            .codec
            .issue_pair(username)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let stored = self
            .refresh_tokens
            .store(username, &pair.refresh_token)
            .await?;
        if !stored {
            return Err(AuthError::Internal(format!(
                "리프레시 토큰 저장 시 영향받은 행 없음: {}",
                username
            )));
        }

        Ok(pair)
    }

    // ============================================================================================
    // Accounts
    // ============================================================================================

    /// 회원가입. 기본 역할이 할당됩니다.
    pub async fn register(&self, user: NewUser, password: &str) -> Result<UserId, AuthError> {
        let id = self.create_user(&user, password).await?;

        if let Err(e) = self.roles.assign_default_role(&user.username).await {
            self.compensate(id, &user.username).await;
            return Err(e.into());
        }

        info!(username = %user.username, user_id = id, "회원가입");
        Ok(id)
    }

    /// 관리자 사용자 추가. 지정한 역할이 할당됩니다.
    pub async fn add_user(
        &self,
        user: NewUser,
        password: &str,
        role: &str,
    ) -> Result<UserId, AuthError> {
        let id = self.create_user(&user, password).await?;

        if let Err(e) = self.roles.assign(&user.username, role).await {
            self.compensate(id, &user.username).await;
            return Err(match e {
                StoreError::NotFound => AuthError::UserOrRoleNotFound,
                other => other.into(),
            });
        }

        info!(username = %user.username, user_id = id, role, "관리자 사용자 추가");
        Ok(id)
    }

    /// 관리자 사용자 삭제. 역할과 리프레시 토큰도 함께 삭제됩니다.
    pub async fn remove_user(&self, user_id: &str) -> Result<String, AuthError> {
        let id = parse_user_id(user_id)?;
        let username = match self.users.find_username_by_id(id).await {
            Ok(username) => username,
            Err(StoreError::NotFound) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        match self.users.delete(id).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        }

        info!(username = %username, user_id = id, "사용자 삭제");
        Ok(username)
    }

    /// 관리자 역할 할당.
    pub async fn assign_role(&self, username: &str, role: &str) -> Result<(), AuthError> {
        self.roles.assign(username, role).await.map_err(|e| match e {
            StoreError::NotFound => AuthError::UserOrRoleNotFound,
            StoreError::Conflict(_) => AuthError::RoleAlreadyAssigned,
            other => other.into(),
        })?;

        info!(username, role, "역할 할당");
        Ok(())
    }

    async fn create_user(&self, user: &NewUser, password: &str) -> Result<UserId, AuthError> {
        if self.users.exists(&user.username, &user.email).await? {
            warn!(username = %user.username, "사용자명 또는 이메일 중복");
            return Err(AuthError::DuplicateUser);
        }

        let hash = self.hash_password(password.to_string()).await?;

        // exists 확인 후 동시 가입이 끼어든 경우
        self.users.create(user, &hash).await.map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::DuplicateUser,
            other => other.into(),
        })
    }

    /// 역할 할당에 실패한 신규 사용자를 되돌립니다.
    async fn compensate(&self, id: UserId, username: &str) {
        if let Err(e) = self.users.delete(id).await {
            error!(username, user_id = id, error = %e, "역할 할당 실패 후 사용자 정리 실패");
        }
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, AuthError> {
    raw.parse::<UserId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AuthError::InvalidUserId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::failing::{FailingStore, Fault};
    use crate::repository::MemoryStore;
    use axum::http::StatusCode;
    use secrecy::SecretString;
    use std::time::Duration;
    use warden_core::{ManualClock, PasswordConfig};

    const START: i64 = 1_700_000_000;

    fn service() -> (AuthService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new("user"));
        let (service, clock) = service_over(store.clone());
        (service, store, clock)
    }

    fn service_over<S>(store: Arc<S>) -> (AuthService, Arc<ManualClock>)
    where
        S: UserRepository + RoleRepository + RefreshTokenStore + 'static,
    {
        let clock = Arc::new(ManualClock::at_timestamp(START));
        let codec = Arc::new(TokenCodec::new(
            &SecretString::new("service-test-secret".into()),
            clock.clone(),
            Duration::from_secs(900),
            Duration::from_secs(7 * 86_400),
        ));
        let credentials = Arc::new(
            CredentialVerifier::new(&PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let service = AuthService::new(
            store.clone(),
            store.clone(),
            store,
            codec,
            credentials,
            "admin",
        );
        (service, clock)
    }

    async fn failing_service() -> (AuthService, Arc<FailingStore>, UserId) {
        let store = Arc::new(FailingStore::new("user"));
        let (service, _) = service_over(store.clone());
        let id = service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();
        (service, store, id)
    }

    fn caller(username: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            username: username.to_string(),
            expires_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_assigns_default_role() {
        let (service, store, _) = service();
        let id = service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();

        let roles = store.roles_of(id).await.unwrap();
        assert!(roles.contains("user"));
        let user = store.find_by_username("alice").await.unwrap();
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let (service, _, _) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();

        let err = service
            .register(NewUser::new("alice", "other@example.com"), "secret1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser));
    }

    #[tokio::test]
    async fn test_login_unknown_and_wrong_password_look_the_same() {
        let (service, _, _) = service();
        service
            .register(NewUser::new("bob", "bob@example.com"), "rightpass")
            .await
            .unwrap();

        let wrong = service.login("bob", "wrongpass").await.unwrap_err();
        let unknown = service.login("nobody", "rightpass").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_login_persists_refresh_token() {
        let (service, store, _) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();

        let pair = service.login("alice", "secret1").await.unwrap();
        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(store.retrieve("alice").await.unwrap(), pair.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let (service, _, clock) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();
        let first = service.login("alice", "secret1").await.unwrap();

        clock.advance(chrono::Duration::seconds(30));
        let second = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            service.refresh(&first.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(service.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_with_same_token_succeeds_once() {
        let (service, store, clock) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();
        let pair = service.login("alice", "secret1").await.unwrap();
        clock.advance(chrono::Duration::seconds(5));

        let (a, b) = tokio::join!(
            service.refresh(&pair.refresh_token),
            service.refresh(&pair.refresh_token)
        );

        let winners: Vec<TokenPair> = [a, b].into_iter().filter_map(Result::ok).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(
            store.retrieve("alice").await.unwrap(),
            winners[0].refresh_token
        );
        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_garbage() {
        let (service, _, _) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();
        let pair = service.login("alice", "secret1").await.unwrap();

        assert!(matches!(
            service.refresh(&pair.access_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));
        assert!(matches!(
            service.refresh("garbage").await,
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_and_checks_caller() {
        let (service, store, _) = service();
        let alice = service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();
        service
            .register(NewUser::new("bob", "bob@example.com"), "rightpass")
            .await
            .unwrap();
        let pair = service.login("alice", "secret1").await.unwrap();

        assert!(matches!(
            service.logout(&caller("bob"), &alice.to_string()).await,
            Err(AuthError::Forbidden)
        ));

        service.logout(&caller("alice"), &alice.to_string()).await.unwrap();
        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidRefreshToken)
        ));

        store.assign("bob", "admin").await.unwrap();
        service.logout(&caller("bob"), &alice.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_bad_identifier() {
        let (service, _, _) = service();
        for raw in ["abc", "-1", "0", "999"] {
            assert!(
                matches!(
                    service.logout(&caller("alice"), raw).await,
                    Err(AuthError::InvalidUserId(_))
                ),
                "id {:?}",
                raw
            );
        }
    }

    #[tokio::test]
    async fn test_add_user_with_unknown_role_rolls_back() {
        let (service, store, _) = service();
        let err = service
            .add_user(NewUser::new("dave", "dave@example.com"), "pw", "wizard")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UserOrRoleNotFound));
        assert!(!store.exists("dave", "dave@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_user() {
        let (service, store, _) = service();
        let id = service
            .add_user(NewUser::new("erin", "erin@example.com"), "pw", "admin")
            .await
            .unwrap();

        assert_eq!(service.remove_user(&id.to_string()).await.unwrap(), "erin");
        assert!(matches!(
            store.find_by_username("erin").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            service.remove_user(&id.to_string()).await,
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            service.remove_user("x1").await,
            Err(AuthError::InvalidUserId(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_role_errors() {
        let (service, _, _) = service();
        service
            .register(NewUser::new("alice", "alice@example.com"), "secret1")
            .await
            .unwrap();

        assert!(matches!(
            service.assign_role("alice", "user").await,
            Err(AuthError::RoleAlreadyAssigned)
        ));
        assert!(matches!(
            service.assign_role("ghost", "admin").await,
            Err(AuthError::UserOrRoleNotFound)
        ));
        service.assign_role("alice", "admin").await.unwrap();
    }

    #[tokio::test]
    async fn test_login_fails_when_refresh_slot_write_affects_nothing() {
        let (service, store, _) = failing_service().await;
        store.fail(Fault::StoreAffectsNothing);

        let err = service.login("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_logout_fails_when_revoke_fails() {
        let (service, store, id) = failing_service().await;
        service.login("alice", "secret1").await.unwrap();
        store.fail(Fault::Revoke);

        let err = service
            .logout(&caller("alice"), &id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(StoreError::Backend(_))));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_refresh_fails_when_rotation_backend_fails() {
        let (service, store, _) = failing_service().await;
        let pair = service.login("alice", "secret1").await.unwrap();
        store.fail(Fault::Rotate);

        let err = service.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(StoreError::Backend(_))));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // 교체되지 않았으므로 저장된 토큰은 그대로입니다
        assert_eq!(store.retrieve("alice").await.unwrap(), pair.refresh_token);
    }

    #[tokio::test]
    async fn test_admin_logout_fails_when_role_lookup_fails() {
        let (service, store, id) = failing_service().await;
        service
            .register(NewUser::new("bob", "bob@example.com"), "rightpass")
            .await
            .unwrap();
        store.fail(Fault::RolesOf);

        let err = service
            .logout(&caller("bob"), &id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }
}
