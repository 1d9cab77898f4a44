//! 설정 관리.
//!
//! 설정은 다음 순서로 덮어씁니다:
//! 1. 구조체 기본값
//! 2. 설정 파일 (기본 `config/default.toml`, 없어도 됨)
//! 3. 기존 배포 호환 환경 변수 (`SERVER_PORT`, `JWT_SECRET_KEY` 등)
//! 4. `WARDEN__` 접두사 환경 변수 (예: `WARDEN__JWT__ACCESS_TOKEN_TTL=30m`)

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::error::{WardenError, WardenResult};

/// 시크릿이 설정되지 않았을 때 사용하는 개발용 값.
const DEVELOPMENT_SECRET: &str = "warden-development-secret-change-me";

/// 기존 환경 변수와 설정 키의 대응.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("SERVER_PORT", "server.port"),
    ("API_VERSION", "api.version"),
    ("DATABASE_URL", "database.url"),
    ("JWT_SECRET_KEY", "jwt.secret"),
    ("JWT_EXPIRATION_TIME", "jwt.access_token_ttl"),
    ("JWT_REFRESH_TOKEN_VALIDITY", "jwt.refresh_token_ttl"),
];

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 토큰 서명 설정
    pub jwt: JwtConfig,
    /// 비밀번호 해시 비용
    pub password: PasswordConfig,
    /// 역할 이름
    pub roles: RoleConfig,
    /// API 경로 설정
    pub api: ApiConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 처리 제한 시간 (초)
    pub request_timeout_secs: u64,
    /// CORS 허용 origin. 비어 있으면 모든 origin 허용
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// 바인딩 주소를 반환합니다.
    pub fn socket_addr(&self) -> WardenResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| WardenError::Config(format!("잘못된 서버 주소: {}", e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL. 없으면 메모리 저장소로 동작합니다.
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
    /// 시작 시 마이그레이션 실행 여부
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connection_timeout_secs: 30,
            run_migrations: true,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// 로그 파일 디렉터리. 비어 있으면 stdout에만 기록
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            dir: None,
        }
    }
}

/// 토큰 서명 설정.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC 서명 시크릿
    #[serde(deserialize_with = "deserialize_secret")]
    pub secret: Option<SecretString>,
    /// 액세스 토큰 수명 (예: "15m")
    pub access_token_ttl: String,
    /// 리프레시 토큰 수명 (예: "7d")
    pub refresh_token_ttl: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            access_token_ttl: "15m".to_string(),
            refresh_token_ttl: "7d".to_string(),
        }
    }
}

impl JwtConfig {
    /// 시크릿을 지정한 설정을 생성합니다.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::new(secret.into().into_boxed_str()));
        self
    }

    pub fn access_ttl(&self) -> WardenResult<Duration> {
        parse_lifetime("jwt.access_token_ttl", &self.access_token_ttl)
    }

    pub fn refresh_ttl(&self) -> WardenResult<Duration> {
        parse_lifetime("jwt.refresh_token_ttl", &self.refresh_token_ttl)
    }

    /// 서명 시크릿을 반환합니다.
    ///
    /// 설정되지 않았으면 경고와 함께 개발용 값을 사용하고, 빈 값은 거부합니다.
    pub fn signing_secret(&self) -> WardenResult<SecretString> {
        match &self.secret {
            Some(secret) if secret.expose_secret().is_empty() => Err(WardenError::Config(
                "jwt.secret은 비어 있을 수 없습니다".to_string(),
            )),
            Some(secret) => Ok(SecretString::new(secret.expose_secret().into())),
            None => {
                warn!("JWT 시크릿이 설정되지 않아 개발용 기본값을 사용합니다. 운영 환경에서는 반드시 설정하세요");
                Ok(SecretString::new(DEVELOPMENT_SECRET.into()))
            }
        }
    }
}

/// Argon2 해시 비용.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// 메모리 비용 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// 역할 이름 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// 가입 시 할당되는 역할
    pub default_role: String,
    /// 관리자 경로에 필요한 역할
    pub elevated_role: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            default_role: "user".to_string(),
            elevated_role: "admin".to_string(),
        }
    }
}

/// API 경로 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API 버전 세그먼트
    pub version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
        }
    }
}

impl ApiConfig {
    /// 모든 API 라우트의 접두 경로 (예: "/api/v1").
    pub fn base_path(&self) -> String {
        format!("/api/{}", self.version)
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> WardenResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, value) in legacy_overrides(|name| std::env::var(name).ok()) {
            builder = builder.set_override(key, value)?;
        }

        Self::finish(builder)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> WardenResult<Self> {
        Self::load("config/default.toml")
    }

    /// TOML 문자열에서 설정을 로드합니다. 환경 변수는 읽지 않습니다.
    pub fn from_toml_str(source: &str) -> WardenResult<Self> {
        let builder = config::Config::builder().add_source(File::from_str(source, FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> WardenResult<Self> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 시작 전에 값의 유효성을 확인합니다.
    pub fn validate(&self) -> WardenResult<()> {
        self.jwt.access_ttl()?;
        self.jwt.refresh_ttl()?;

        if let Some(secret) = &self.jwt.secret {
            if secret.expose_secret().is_empty() {
                return Err(WardenError::Config(
                    "jwt.secret은 비어 있을 수 없습니다".to_string(),
                ));
            }
        }

        if self.roles.default_role.is_empty() || self.roles.elevated_role.is_empty() {
            return Err(WardenError::Config("역할 이름은 비어 있을 수 없습니다".to_string()));
        }

        if self.api.version.is_empty() || self.api.version.contains('/') {
            return Err(WardenError::Config(format!(
                "잘못된 API 버전: {:?}",
                self.api.version
            )));
        }

        Ok(())
    }
}

/// 기존 환경 변수 중 값이 있고 `WARDEN__` 변수로 덮어쓰지 않은 항목을 모읍니다.
fn legacy_overrides(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    LEGACY_ENV_KEYS
        .iter()
        .filter_map(|(legacy, key)| {
            let prefixed = format!("WARDEN__{}", key.replace('.', "__").to_uppercase());
            if lookup(&prefixed).is_some() {
                return None;
            }
            lookup(legacy).map(|value| (*key, value))
        })
        .collect()
}

fn parse_lifetime(key: &str, value: &str) -> WardenResult<Duration> {
    let lifetime = humantime::parse_duration(value)
        .map_err(|e| WardenError::Config(format!("{} 값 {:?}을 해석할 수 없습니다: {}", key, value, e)))?;

    if lifetime.as_secs() == 0 {
        return Err(WardenError::Config(format!("{}는 1초 이상이어야 합니다", key)));
    }

    Ok(lifetime)
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|value| SecretString::new(value.into_boxed_str())))
}
