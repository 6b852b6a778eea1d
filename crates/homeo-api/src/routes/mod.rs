//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/auth` - 회원가입, 로그인, 토큰 재발급, 내 정보
//! - `/api/patients` - 환자 관리
//! - `/api/appointments` - 예약 관리
//! - `/api/consultations` - 진료 및 처방 (ADMIN, DOCTOR)

pub mod appointments;
pub mod auth;
pub mod consultations;
pub mod health;
pub mod patients;

pub use appointments::{appointments_router, CreateAppointmentRequest, UpdateAppointmentRequest};
pub use auth::{
    auth_router, AuthResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest,
};
pub use consultations::{consultations_router, CreateConsultationRequest, CreatePrescriptionRequest};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use patients::{patients_router, CreatePatientRequest, UpdatePatientRequest};

use std::sync::Arc;

use axum::Router;

use crate::auth::TokenService;
use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 보호된 라우터는 인증 게이트에 토큰 서비스를 직접 받습니다.
pub fn create_api_router(tokens: Arc<TokenService>) -> Router<Arc<AppState>> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // API 엔드포인트
        .nest("/api/auth", auth_router(tokens.clone()))
        .nest("/api/patients", patients_router(tokens.clone()))
        .nest("/api/appointments", appointments_router(tokens.clone()))
        .nest("/api/consultations", consultations_router(tokens))
}
