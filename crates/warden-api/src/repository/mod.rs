//! 저장소 협력자 구현.
//!
//! - [`PgStore`]: PostgreSQL (sqlx). 모든 쓰기는 단일 SQL 문 또는 하나의 트랜잭션입니다.
//! - [`MemoryStore`]: 프로세스 내부 저장소. 테스트와 `DATABASE_URL`이 없는 개발 환경용입니다.

#[cfg(test)]
pub(crate) mod failing;
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{run_migrations, PgStore};
