//! 예약 API 라우트.
//!
//! # 엔드포인트
//!
//! - `GET /api/appointments?status=` - 예약 목록 (날짜/시간 오름차순)
//! - `GET /api/appointments/{id}` - 예약 조회
//! - `POST /api/appointments` - 예약 생성 (PENDING)
//! - `PUT /api/appointments/{id}` - 상태/메모 수정 (ADMIN, DOCTOR, RECEPTIONIST)
//! - `DELETE /api/appointments/{id}` - 예약 취소 (CANCELLED)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authenticate, require_roles, Role, RoleGate, TokenService};
use crate::error::{ApiError, ApiErrorResponse, ApiResponse, ApiResult};
use crate::repository::{
    AppointmentRecord, AppointmentRepository, AppointmentWithNames, NewAppointment,
    PatientRepository, UserRepository,
};
use crate::state::AppState;
use crate::validation::{
    parse_appointment_status, parse_date, parse_time, parse_uuid, validate_appointment_status,
    validate_date, validate_time, validate_uuid,
};

// ================================================================================================
// Request Types
// ================================================================================================

/// 목록 쿼리
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AppointmentQuery {
    /// PENDING | CONFIRMED | COMPLETED | CANCELLED | RESCHEDULED
    pub status: Option<String>,
}

/// 예약 생성 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    #[validate(custom(function = "validate_uuid"))]
    pub patient_id: String,
    /// 의사 계정 ID
    #[validate(custom(function = "validate_uuid"))]
    pub doctor_id: String,
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date"))]
    pub appointment_date: String,
    /// HH:mm
    #[validate(custom(function = "validate_time"))]
    pub appointment_time: String,
    pub notes: Option<String>,
}

/// 예약 수정 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    #[validate(custom(function = "validate_appointment_status"))]
    pub status: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<CreateAppointmentRequest> for NewAppointment {
    type Error = ApiError;

    fn try_from(req: CreateAppointmentRequest) -> Result<Self, Self::Error> {
        let invalid = |field: &str| ApiError::validation(format!("Invalid {}", field));

        Ok(NewAppointment {
            patient_id: parse_uuid(&req.patient_id).ok_or_else(|| invalid("patientId"))?,
            doctor_id: parse_uuid(&req.doctor_id).ok_or_else(|| invalid("doctorId"))?,
            appointment_date: parse_date(&req.appointment_date)
                .ok_or_else(|| invalid("appointmentDate"))?,
            appointment_time: parse_time(&req.appointment_time)
                .ok_or_else(|| invalid("appointmentTime"))?,
            notes: req.notes,
        })
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Appointment not found".to_string())
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 예약 목록
#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(AppointmentQuery),
    responses(
        (status = 200, description = "예약 목록 (envelope의 data)", body = Vec<AppointmentWithNames>),
        (status = 400, description = "알 수 없는 상태", body = ApiErrorResponse)
    )
)]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentQuery>,
) -> ApiResult<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .map(parse_appointment_status)
        .transpose()?;

    let pool = state.db()?;
    let appointments = AppointmentRepository::list(pool, status).await?;
    debug!(count = appointments.len(), ?status, "예약 목록 조회");

    Ok(ApiResponse::ok(
        "Appointments retrieved successfully",
        appointments,
    ))
}

/// 예약 조회
#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "예약 ID")),
    responses(
        (status = 200, description = "예약 (envelope의 data)", body = AppointmentWithNames),
        (status = 404, description = "예약 없음", body = ApiErrorResponse)
    )
)]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let appointment = AppointmentRepository::find_by_id(pool, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(
        "Appointment retrieved successfully",
        appointment,
    ))
}

/// 예약 생성. 환자와 의사(DOCTOR 역할 계정)가 존재해야 합니다.
#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "appointments",
    security(("bearer_auth" = [])),
    request_body = CreateAppointmentRequest,
    responses(
        (status = 201, description = "생성 완료 (envelope의 data)", body = AppointmentRecord),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 404, description = "환자 또는 의사 없음", body = ApiErrorResponse)
    )
)]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let input = NewAppointment::try_from(req)?;

    let pool = state.db()?;

    if !PatientRepository::exists(pool, input.patient_id).await? {
        return Err(ApiError::NotFound("Patient not found".to_string()));
    }
    if UserRepository::find_doctor(pool, input.doctor_id).await?.is_none() {
        return Err(ApiError::NotFound("Doctor not found".to_string()));
    }

    let appointment = AppointmentRepository::create(pool, input).await?;
    info!(
        appointment_id = %appointment.id,
        patient_id = %appointment.patient_id,
        doctor_id = %appointment.doctor_id,
        "예약 생성"
    );

    Ok(ApiResponse::created(
        "Appointment created successfully",
        appointment,
    ))
}

/// 예약 상태/메모 수정
#[utoipa::path(
    put,
    path = "/api/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "예약 ID")),
    request_body = UpdateAppointmentRequest,
    responses(
        (status = 200, description = "수정 완료 (envelope의 data)", body = AppointmentRecord),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "예약 없음", body = ApiErrorResponse)
    )
)]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let status = req
        .status
        .as_deref()
        .map(parse_appointment_status)
        .transpose()?;

    let pool = state.db()?;
    let appointment = AppointmentRepository::update(pool, id, status, req.notes)
        .await?
        .ok_or_else(not_found)?;

    info!(appointment_id = %id, status = %appointment.status, "예약 수정");
    Ok(ApiResponse::ok(
        "Appointment updated successfully",
        appointment,
    ))
}

/// 예약 취소. 레코드는 남기고 상태만 CANCELLED로 바꿉니다.
#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    tag = "appointments",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "예약 ID")),
    responses(
        (status = 200, description = "취소 완료 (envelope의 data)", body = AppointmentRecord),
        (status = 404, description = "예약 없음", body = ApiErrorResponse)
    )
)]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let appointment = AppointmentRepository::cancel(pool, id)
        .await?
        .ok_or_else(not_found)?;

    info!(appointment_id = %id, "예약 취소");
    Ok(ApiResponse::ok(
        "Appointment cancelled successfully",
        appointment,
    ))
}

// ================================================================================================
// Router
// ================================================================================================

/// 예약 라우터 생성. 수정만 직원 역할로 제한됩니다.
pub fn appointments_router(tokens: Arc<TokenService>) -> Router<Arc<AppState>> {
    let staff = Router::new()
        .route("/{id}", put(update_appointment))
        .route_layer(middleware::from_fn_with_state(
            RoleGate(Role::STAFF),
            require_roles,
        ));

    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route("/{id}", get(get_appointment).delete(cancel_appointment))
        .merge(staff)
        .route_layer(middleware::from_fn_with_state(tokens, authenticate))
}
