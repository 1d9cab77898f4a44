//! 도메인 모델과 외부 협력자 계약.

mod clock;
mod repository;
mod user;

pub use clock::*;
pub use repository::*;
pub use user::*;
