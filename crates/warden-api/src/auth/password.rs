//! 비밀번호 해싱과 검증.
//!
//! Argon2id 기반이며 비용 파라미터는 [`PasswordConfig`]로 조정합니다.
//! 평문 비밀번호는 어디에도 기록하지 않습니다.

use argon2::{
    password_hash::{self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use warden_core::PasswordConfig;

/// 사용자가 존재하지 않을 때 검증 시간을 맞추기 위한 비밀번호.
const TIMING_DUMMY_PASSWORD: &str = "warden-timing-equalizer";

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패: {0}")]
    HashingFailed(String),
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("잘못된 해시 비용 파라미터: {0}")]
    InvalidParams(String),
}

/// 자격 증명 검증기.
///
/// 외부 상태가 없으며 복제해서 블로킹 작업 스레드로 넘길 수 있습니다.
#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    params: Params,
    dummy_hash: String,
}

impl CredentialVerifier {
    /// 설정된 비용으로 검증기를 생성합니다.
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let mut verifier = Self {
            params,
            dummy_hash: String::new(),
        };
        verifier.dummy_hash = verifier.hash(TIMING_DUMMY_PASSWORD)?;
        Ok(verifier)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// 비밀번호를 솔트와 함께 해싱합니다.
    ///
    /// PHC 형식 문자열을 반환합니다 (예: `$argon2id$v=19$m=19456,t=2,p=1$...`).
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// 저장된 해시와 비밀번호를 비교합니다.
    ///
    /// 불일치는 `Ok(false)`이며, 해시 자체가 손상된 경우에만 에러입니다.
    /// 비용 파라미터는 해시에 기록된 값을 사용합니다.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        match self.argon2().verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(PasswordError::InvalidHashFormat),
        }
    }

    /// 존재하지 않는 사용자에 대해 실제 검증과 같은 비용을 소모합니다.
    pub fn verify_dummy(&self, plaintext: &str) {
        let _ = self.verify(plaintext, &self.dummy_hash);
    }
}
