//! 진료 API 라우트.
//!
//! 모든 경로는 ADMIN, DOCTOR 전용입니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/consultations?patientId=&doctorId=&status=` - 진료 목록
//! - `GET /api/consultations/{id}` - 진료 상세 (처방 및 항목 포함)
//! - `POST /api/consultations` - 진료 생성 (현재 시각, 30분)
//! - `PUT /api/consultations/{id}` - 진단/메모/상태 수정
//! - `POST /api/consultations/{id}/prescriptions` - 구조화된 처방 생성

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use homeo_core::ConsultationStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authenticate, require_roles, Role, RoleGate, TokenService};
use crate::error::{ApiError, ApiErrorResponse, ApiResponse, ApiResult};
use crate::repository::{
    is_foreign_key_violation, ConsultationDetail, ConsultationFilter, ConsultationRecord,
    ConsultationRepository, ConsultationWithNames, NewConsultation, NewPrescriptionItem,
    PatientRepository, PrescriptionWithItems, UserRepository,
};
use crate::state::AppState;
use crate::validation::{parse_uuid, validate_consultation_status, validate_uuid};

// ================================================================================================
// Request Types
// ================================================================================================

/// 목록 필터 쿼리
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    /// SCHEDULED | IN_PROGRESS | COMPLETED | CANCELLED | NO_SHOW
    pub status: Option<String>,
}

impl TryFrom<ConsultationQuery> for ConsultationFilter {
    type Error = ApiError;

    fn try_from(query: ConsultationQuery) -> Result<Self, Self::Error> {
        Ok(ConsultationFilter {
            patient_id: query.patient_id,
            doctor_id: query.doctor_id,
            status: query
                .status
                .as_deref()
                .map(str::parse::<ConsultationStatus>)
                .transpose()?,
        })
    }
}

/// 진료 생성 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateConsultationRequest {
    #[validate(custom(function = "validate_uuid"))]
    pub patient_id: String,
    /// 의사 계정 ID
    #[validate(custom(function = "validate_uuid"))]
    pub doctor_id: String,
    #[validate(custom(function = "validate_uuid"))]
    pub appointment_id: Option<String>,
    #[validate(length(min = 10, message = "Complaints must be at least 10 characters"))]
    pub complaints: String,
    pub diagnosis: Option<String>,
    /// 자유 형식 처방 메모
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

/// 진료 수정 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateConsultationRequest {
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    #[validate(custom(function = "validate_consultation_status"))]
    pub status: Option<String>,
}

/// 처방 항목
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PrescriptionItemRequest {
    #[validate(length(min = 1, message = "Medicine name is required"))]
    pub medicine_name: String,
    #[validate(length(min = 1, message = "Potency is required"))]
    pub potency: String,
    #[validate(length(min = 1, message = "Dosage is required"))]
    pub dosage: String,
    #[validate(length(min = 1, message = "Frequency is required"))]
    pub frequency: String,
    #[validate(length(min = 1, message = "Duration is required"))]
    pub duration: String,
    pub notes: Option<String>,
}

/// 처방 생성 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePrescriptionRequest {
    #[validate(length(min = 1, message = "At least one prescription item is required"), nested)]
    pub items: Vec<PrescriptionItemRequest>,
    pub notes: Option<String>,
}

impl From<PrescriptionItemRequest> for NewPrescriptionItem {
    fn from(item: PrescriptionItemRequest) -> Self {
        NewPrescriptionItem {
            medicine_name: item.medicine_name,
            potency: item.potency,
            dosage: item.dosage,
            frequency: item.frequency,
            duration: item.duration,
            notes: item.notes,
        }
    }
}

impl TryFrom<CreateConsultationRequest> for NewConsultation {
    type Error = ApiError;

    fn try_from(req: CreateConsultationRequest) -> Result<Self, Self::Error> {
        let invalid = |field: &str| ApiError::validation(format!("Invalid {}", field));

        Ok(NewConsultation {
            patient_id: parse_uuid(&req.patient_id).ok_or_else(|| invalid("patientId"))?,
            doctor_id: parse_uuid(&req.doctor_id).ok_or_else(|| invalid("doctorId"))?,
            appointment_id: req
                .appointment_id
                .as_deref()
                .map(|id| parse_uuid(id).ok_or_else(|| invalid("appointmentId")))
                .transpose()?,
            complaints: req.complaints,
            diagnosis: req.diagnosis,
            prescription: req.prescription,
            notes: req.notes,
        })
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Consultation not found".to_string())
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 진료 목록
#[utoipa::path(
    get,
    path = "/api/consultations",
    tag = "consultations",
    security(("bearer_auth" = [])),
    params(ConsultationQuery),
    responses(
        (status = 200, description = "진료 목록 (envelope의 data)", body = Vec<ConsultationWithNames>),
        (status = 400, description = "알 수 없는 상태", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn list_consultations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConsultationQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = ConsultationFilter::try_from(query)?;

    let pool = state.db()?;
    let consultations = ConsultationRepository::list(pool, filter).await?;
    debug!(count = consultations.len(), "진료 목록 조회");

    Ok(ApiResponse::ok(
        "Consultations retrieved successfully",
        consultations,
    ))
}

/// 진료 상세
#[utoipa::path(
    get,
    path = "/api/consultations/{id}",
    tag = "consultations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "진료 ID")),
    responses(
        (status = 200, description = "진료 상세 (envelope의 data)", body = ConsultationDetail),
        (status = 404, description = "진료 없음", body = ApiErrorResponse)
    )
)]
pub async fn get_consultation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let consultation = ConsultationRepository::find_detail(pool, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok(
        "Consultation retrieved successfully",
        consultation,
    ))
}

/// 진료 생성
#[utoipa::path(
    post,
    path = "/api/consultations",
    tag = "consultations",
    security(("bearer_auth" = [])),
    request_body = CreateConsultationRequest,
    responses(
        (status = 201, description = "생성 완료 (envelope의 data)", body = ConsultationRecord),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 404, description = "환자 또는 의사 없음", body = ApiErrorResponse)
    )
)]
pub async fn create_consultation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConsultationRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let input = NewConsultation::try_from(req)?;

    let pool = state.db()?;

    if !PatientRepository::exists(pool, input.patient_id).await? {
        return Err(ApiError::NotFound("Patient not found".to_string()));
    }
    if UserRepository::find_doctor(pool, input.doctor_id).await?.is_none() {
        return Err(ApiError::NotFound("Doctor not found".to_string()));
    }

    let consultation = ConsultationRepository::create(pool, input)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                ApiError::NotFound("Appointment not found".to_string())
            } else {
                ApiError::Database(e)
            }
        })?;

    info!(
        consultation_id = %consultation.id,
        patient_id = %consultation.patient_id,
        "진료 생성"
    );
    Ok(ApiResponse::created(
        "Consultation created successfully",
        consultation,
    ))
}

/// 진료 수정
#[utoipa::path(
    put,
    path = "/api/consultations/{id}",
    tag = "consultations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "진료 ID")),
    request_body = UpdateConsultationRequest,
    responses(
        (status = 200, description = "수정 완료 (envelope의 data)", body = ConsultationRecord),
        (status = 404, description = "진료 없음", body = ApiErrorResponse)
    )
)]
pub async fn update_consultation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateConsultationRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let status = req
        .status
        .as_deref()
        .map(str::parse::<ConsultationStatus>)
        .transpose()?;

    let pool = state.db()?;
    let consultation = ConsultationRepository::update(pool, id, req.diagnosis, req.notes, status)
        .await?
        .ok_or_else(not_found)?;

    info!(consultation_id = %id, status = %consultation.status, "진료 수정");
    Ok(ApiResponse::ok(
        "Consultation updated successfully",
        consultation,
    ))
}

/// 처방 생성. 처방과 항목은 하나의 트랜잭션으로 저장됩니다.
#[utoipa::path(
    post,
    path = "/api/consultations/{id}/prescriptions",
    tag = "consultations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "진료 ID")),
    request_body = CreatePrescriptionRequest,
    responses(
        (status = 201, description = "생성 완료 (envelope의 data)", body = PrescriptionWithItems),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 404, description = "진료 없음", body = ApiErrorResponse)
    )
)]
pub async fn create_prescription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreatePrescriptionRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let pool = state.db()?;
    let consultation = ConsultationRepository::find_by_id(pool, id)
        .await?
        .ok_or_else(not_found)?;

    let items: Vec<NewPrescriptionItem> = req.items.into_iter().map(Into::into).collect();
    let prescription = ConsultationRepository::create_prescription(
        pool,
        &consultation.consultation,
        req.notes,
        items,
    )
    .await?;

    info!(
        consultation_id = %id,
        prescription_id = %prescription.prescription.id,
        items = prescription.items.len(),
        "처방 생성"
    );
    Ok(ApiResponse::created(
        "Prescription created successfully",
        prescription,
    ))
}

// ================================================================================================
// Router
// ================================================================================================

/// 진료 라우터 생성.
pub fn consultations_router(tokens: Arc<TokenService>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_consultations).post(create_consultation))
        .route("/{id}", get(get_consultation).put(update_consultation))
        .route("/{id}/prescriptions", post(create_prescription))
        .route_layer(middleware::from_fn_with_state(
            RoleGate(Role::CLINICAL),
            require_roles,
        ))
        .route_layer(middleware::from_fn_with_state(tokens, authenticate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenPayload;
    use crate::state::create_test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<AppState>) {
        let state = Arc::new(create_test_state());
        let router = Router::new()
            .nest(
                "/api/consultations",
                consultations_router(state.tokens.clone()),
            )
            .with_state(state.clone());
        (router, state)
    }

    fn bearer(state: &AppState, role: Role) -> String {
        let payload = TokenPayload::new(Uuid::new_v4().to_string(), "user@example.com", role);
        format!("Bearer {}", state.tokens.issue_access(&payload).unwrap())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, auth: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_filter_from_query() {
        let patient_id = Uuid::new_v4();
        let filter = ConsultationFilter::try_from(ConsultationQuery {
            patient_id: Some(patient_id),
            doctor_id: None,
            status: Some("IN_PROGRESS".to_string()),
        })
        .unwrap();

        assert_eq!(filter.patient_id, Some(patient_id));
        assert_eq!(filter.status, Some(ConsultationStatus::InProgress));

        let bad = ConsultationFilter::try_from(ConsultationQuery {
            status: Some("FINISHED".to_string()),
            ..Default::default()
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_complaints_minimum_length() {
        let req: CreateConsultationRequest = serde_json::from_value(json!({
            "patientId": Uuid::new_v4().to_string(),
            "doctorId": Uuid::new_v4().to_string(),
            "complaints": "headache"
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("complaints"));
    }

    #[test]
    fn test_create_request_converts() {
        let appointment_id = Uuid::new_v4();
        let req: CreateConsultationRequest = serde_json::from_value(json!({
            "patientId": Uuid::new_v4().to_string(),
            "doctorId": Uuid::new_v4().to_string(),
            "appointmentId": appointment_id.to_string(),
            "complaints": "Recurring migraine for two weeks"
        }))
        .unwrap();
        assert!(req.validate().is_ok());

        let input = NewConsultation::try_from(req).unwrap();
        assert_eq!(input.appointment_id, Some(appointment_id));
        assert!(input.diagnosis.is_none());
    }

    #[tokio::test]
    async fn test_patient_and_receptionist_forbidden() {
        let (app, state) = app();

        for role in [Role::Patient, Role::Receptionist] {
            let (status, json) = send(
                app.clone(),
                get("/api/consultations", &bearer(&state, role)),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(json["message"], "Insufficient permissions");
        }
    }

    #[tokio::test]
    async fn test_doctor_passes_gate() {
        let (app, state) = app();

        let (status, _) = send(app, get("/api/consultations", &bearer(&state, Role::Doctor))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_prescription_requires_items() {
        let (app, state) = app();
        let uri = format!("/api/consultations/{}/prescriptions", Uuid::new_v4());

        let (status, json) = send(
            app,
            post_json(&uri, &bearer(&state, Role::Doctor), json!({ "items": [] })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "At least one prescription item is required");
    }

    #[tokio::test]
    async fn test_prescription_item_fields_validated() {
        let (app, state) = app();
        let uri = format!("/api/consultations/{}/prescriptions", Uuid::new_v4());
        let body = json!({
            "items": [{
                "medicineName": "Arnica",
                "potency": "30C",
                "dosage": "",
                "frequency": "TDS",
                "duration": "7 days"
            }]
        });

        let (status, _) = send(app, post_json(&uri, &bearer(&state, Role::Admin), body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
