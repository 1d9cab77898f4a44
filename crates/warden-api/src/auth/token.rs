//! 서명 토큰 발급과 검증.
//!
//! HS256으로 서명된 JWT를 사용합니다. 만료 판정은 주입된 [`Clock`]으로
//! 검증 시점마다 다시 계산하며, 서명이 확인되기 전의 클레임은 신뢰하지 않습니다.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use warden_core::{Clock, JwtConfig, WardenResult};

/// 토큰 종류.
///
/// 리프레시 토큰은 액세스 토큰 자리에서, 액세스 토큰은 리프레시 자리에서
/// 받아들여지지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자명
    pub sub: String,
    /// 토큰 종류
    pub kind: TokenKind,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 같은 초에 발급된 토큰도 서로 구별됩니다
    pub jti: String,
}

impl Claims {
    /// 만료 시각.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_default()
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// 토큰 검증 에러.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// 구조가 깨진 토큰
    #[error("잘못된 토큰 형식")]
    Malformed,
    /// 서명 불일치
    #[error("토큰 서명이 유효하지 않습니다")]
    Forged,
    #[error("토큰이 만료되었습니다")]
    Expired,
    /// 기대한 종류가 아닌 토큰
    #[error("{expected} 토큰이 필요하지만 {found} 토큰입니다")]
    WrongKind { expected: TokenKind, found: TokenKind },
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    /// 로그에 남길 짧은 사유.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::Forged => "forged",
            TokenError::Expired => "expired",
            TokenError::WrongKind { .. } => "wrong_kind",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::Forged,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

/// 토큰 코덱.
///
/// 서명 시크릿은 생성 시 한 번 주입되며 이후 변경되지 않습니다.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("clock", &self.clock)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(
        secret: &SecretString,
        clock: Arc<dyn Clock>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            clock,
            access_ttl,
            refresh_ttl,
        }
    }

    /// JWT 설정에서 코덱을 생성합니다.
    pub fn from_config(config: &JwtConfig, clock: Arc<dyn Clock>) -> WardenResult<Self> {
        Ok(Self::new(
            &config.signing_secret()?,
            clock,
            config.access_ttl()?,
            config.refresh_ttl()?,
        ))
    }

    /// 종류별 기본 수명.
    pub fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// 종류별 기본 수명으로 토큰을 발급합니다.
    pub fn mint(&self, subject: &str, kind: TokenKind) -> Result<String, TokenError> {
        self.mint_with_ttl(subject, kind, self.ttl_for(kind))
    }

    /// 현재 시각 + `ttl`을 만료로 하는 토큰을 발급합니다.
    pub fn mint_with_ttl(
        &self,
        subject: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let iat = self.clock.now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        self.sign(&Claims {
            sub: subject.to_string(),
            kind,
            iat,
            exp: iat.saturating_add(ttl_secs),
            jti: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// 클레임을 서명합니다. 같은 클레임과 시크릿이면 같은 토큰이 나옵니다.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// 액세스/리프레시 토큰 쌍을 발급합니다.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.mint(subject, TokenKind::Access)?,
            refresh_token: self.mint(subject, TokenKind::Refresh)?,
        })
    }

    /// 토큰을 검증합니다.
    ///
    /// 서명을 먼저 확인하고(`Forged`), 그 다음 `now >= exp`이면 `Expired`,
    /// 마지막으로 종류를 확인합니다. 시계는 한 번만 읽습니다.
    ///
    /// `iat`와 비교 시각은 모두 초 단위로 잘립니다. x.7초에 발급된 토큰은 실제
    /// 발급 시각 + 수명보다 최대 1초 일찍 만료됩니다 (JWT `NumericDate`와 같은 동작).
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(classify)?
            .claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }

        Ok(claims)
    }

    /// 서명을 확인하지 않고 subject만 읽습니다.
    ///
    /// 사용자별 서버 상태를 찾는 용도로만 사용하며, 결과를 인증 근거로 쓰면 안 됩니다.
    pub fn extract_unverified_subject(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub"]);

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims.sub)
            .map_err(|_| TokenError::Malformed)
    }
}
