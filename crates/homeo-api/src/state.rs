//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `Arc<AppState>`로 공유되며, 생성 후에는 변경되지 않으므로 잠금이 필요 없습니다.

use std::sync::Arc;

use homeo_core::AuthConfig;

use crate::auth::{CredentialHasher, PasswordError, TokenService};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 데이터베이스 연결 풀. 없으면 DB 기반 핸들러는 503을 반환합니다.
    pub db_pool: Option<sqlx::PgPool>,

    /// 토큰 발급/검증 서비스
    pub tokens: Arc<TokenService>,

    /// 비밀번호 해셔
    pub hasher: CredentialHasher,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 인증 설정으로 상태를 생성합니다.
    pub fn new(auth: &AuthConfig) -> Result<Self, PasswordError> {
        Ok(Self {
            db_pool: None,
            tokens: Arc::new(TokenService::new(auth)),
            hasher: CredentialHasher::new(&auth.password_hash)?,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// 데이터베이스 풀 설정.
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 설정된 풀을 반환하거나 503 에러.
    pub fn db(&self) -> Result<&sqlx::PgPool, crate::error::ApiError> {
        self.db_pool
            .as_ref()
            .ok_or_else(crate::error::ApiError::database_unavailable)
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
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

/// 테스트용 시크릿.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_ACCESS_SECRET: &str = "test-access-secret-0123456789abcdefghij";
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdefghij";

/// 테스트용 AppState 생성 (DB 없음, 저비용 해시 파라미터).
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    let auth = AuthConfig::new(TEST_ACCESS_SECRET, TEST_REFRESH_SECRET)
        .expect("test secrets are valid")
        .with_password_hash(homeo_core::PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        });

    AppState::new(&auth).expect("test hash parameters are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_without_database() {
        let state = create_test_state();

        assert!(state.db_pool.is_none());
        assert!(state.db().is_err());
        assert!(!state.is_db_healthy().await);
        assert!(state.uptime_secs() >= 0);
    }
}
