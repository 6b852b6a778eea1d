//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가
//!
//! 성공 응답 본문은 `{success, message, data, timestamp}` 봉투로 감싸지며,
//! 각 경로에 표시된 스키마는 `data` 필드의 형태입니다.

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use homeo_core::{AppointmentStatus, BloodGroup, ConsultationStatus, Gender, UserStatus};

use crate::auth::{Role, TokenPair, TokenPayload};
use crate::error::ApiErrorResponse;
use crate::repository::{
    AppointmentRecord, AppointmentWithNames, ConsultationDetail, ConsultationRecord,
    ConsultationWithNames, PatientDetail, PatientRecord, PatientWithUser, PrescriptionItemRecord,
    PrescriptionRecord, PrescriptionWithItems, UserRecord,
};
use crate::routes::{
    consultations::{PrescriptionItemRequest, UpdateConsultationRequest},
    AuthResponse, ChangePasswordRequest, ComponentHealth, ComponentStatus, CreateAppointmentRequest,
    CreateConsultationRequest, CreatePatientRequest, CreatePrescriptionRequest, HealthResponse,
    LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, UpdateAppointmentRequest,
    UpdatePatientRequest,
};

// ==================== OpenAPI 문서 정의 ====================

/// Homeo API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Homeo Clinic API",
        description = r#"
# Homeo 클리닉 관리 REST API

환자, 예약, 진료, 처방 관리를 위한 REST API입니다.

## 인증

`/api/auth/register`, `/api/auth/login`, `/api/auth/refresh`를 제외한 모든
`/api` 엔드포인트는 `Authorization: Bearer <access token>` 헤더가 필요합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3001", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 가입, 로그인, 토큰 재발급"),
        (name = "patients", description = "환자 - 프로필 관리"),
        (name = "appointments", description = "예약 - 일정 관리"),
        (name = "consultations", description = "진료 - 진료 기록 및 처방")
    ),
    modifiers(&SecurityAddon),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Common =====
            ApiErrorResponse,
            Role,
            UserStatus,
            Gender,
            BloodGroup,
            AppointmentStatus,
            ConsultationStatus,

            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Auth =====
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            ChangePasswordRequest,
            AuthResponse,
            RefreshResponse,
            TokenPair,
            TokenPayload,
            UserRecord,

            // ===== Patients =====
            CreatePatientRequest,
            UpdatePatientRequest,
            PatientRecord,
            PatientWithUser,
            PatientDetail,

            // ===== Appointments =====
            CreateAppointmentRequest,
            UpdateAppointmentRequest,
            AppointmentRecord,
            AppointmentWithNames,

            // ===== Consultations =====
            CreateConsultationRequest,
            UpdateConsultationRequest,
            CreatePrescriptionRequest,
            PrescriptionItemRequest,
            ConsultationRecord,
            ConsultationWithNames,
            ConsultationDetail,
            PrescriptionRecord,
            PrescriptionItemRecord,
            PrescriptionWithItems,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::me,
        crate::routes::auth::change_password,

        // ===== Patients =====
        crate::routes::patients::list_patients,
        crate::routes::patients::get_patient,
        crate::routes::patients::create_patient,
        crate::routes::patients::update_patient,
        crate::routes::patients::delete_patient,

        // ===== Appointments =====
        crate::routes::appointments::list_appointments,
        crate::routes::appointments::get_appointment,
        crate::routes::appointments::create_appointment,
        crate::routes::appointments::update_appointment,
        crate::routes::appointments::cancel_appointment,

        // ===== Consultations =====
        crate::routes::consultations::list_consultations,
        crate::routes::consultations::get_consultation,
        crate::routes::consultations::create_consultation,
        crate::routes::consultations::update_consultation,
        crate::routes::consultations::create_prescription,
    )
)]
pub struct ApiDoc;

/// `bearer_auth` 보안 스킴 등록.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token"))
                        .build(),
                ),
            )
        }
    }
}

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
