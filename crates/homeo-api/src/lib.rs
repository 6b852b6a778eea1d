//! Homeo 클리닉 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API (환자, 예약, 진료, 처방)
//! - JWT access/refresh 토큰 인증과 역할 기반 인가
//! - Argon2id 비밀번호 해싱
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 토큰, 비밀번호 해싱, 인가 게이트
//! - [`repository`]: 데이터베이스 접근
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;
pub mod validation;

pub use auth::{
    AuthError, AuthenticatedUser, CredentialHasher, CurrentUser, PasswordError, Role, TokenError,
    TokenPair, TokenPayload, TokenService,
};
pub use error::{ApiError, ApiErrorResponse, ApiResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, TEST_ACCESS_SECRET, TEST_REFRESH_SECRET};
