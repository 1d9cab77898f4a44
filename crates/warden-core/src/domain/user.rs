//! 사용자 식별 정보.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 저장소가 부여하는 불변 사용자 ID.
pub type UserId = i64;

/// 저장된 사용자 식별 정보.
///
/// `password_hash`는 직렬화에서 제외되어 외부로 노출되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    /// 사용자 ID
    pub id: UserId,
    /// 사용자명 (고유, 불변)
    pub username: String,
    /// 이메일 (고유)
    pub email: String,
    /// 저장된 비밀번호 해시
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 국가
    pub country: Option<String>,
    /// 전화번호
    pub phone: Option<String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

/// 생성할 사용자의 프로필.
///
/// 평문 비밀번호는 포함하지 않습니다. 해시는 별도로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl NewUser {
    /// 필수 필드만으로 새 사용자 프로필을 생성합니다.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            country: None,
            phone: None,
        }
    }
}
