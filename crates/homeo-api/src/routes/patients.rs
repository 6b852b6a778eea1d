//! 환자 API 라우트.
//!
//! # 엔드포인트
//!
//! - `GET /api/patients` - 환자 목록 (ADMIN, DOCTOR, RECEPTIONIST)
//! - `GET /api/patients/{id}` - 환자 상세, 최근 진료/예약 5건 포함 (ADMIN, DOCTOR, RECEPTIONIST)
//! - `POST /api/patients` - 환자 프로필 생성 (인증된 모든 사용자, 소유자는 요청자)
//! - `PUT /api/patients/{id}` - 부분 수정 (ADMIN, DOCTOR, RECEPTIONIST)
//! - `DELETE /api/patients/{id}` - 삭제 (ADMIN)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use homeo_core::{BloodGroup, Gender};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{authenticate, require_roles, CurrentUser, Role, RoleGate, TokenService};
use crate::error::{ApiError, ApiErrorResponse, ApiResponse, ApiResult};
use crate::repository::{
    is_foreign_key_violation, is_unique_violation, PatientDetail, PatientInput, PatientPatch,
    PatientRecord, PatientRepository, PatientWithUser,
};
use crate::state::AppState;
use crate::validation::{
    parse_date, validate_blood_group, validate_date, validate_gender, validate_phone,
    validate_postal_code,
};

// ================================================================================================
// Request Types
// ================================================================================================

/// 환자 생성 요청
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePatientRequest {
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date"))]
    pub date_of_birth: String,
    /// MALE | FEMALE | OTHER
    #[validate(custom(function = "validate_gender"))]
    pub gender: String,
    #[validate(custom(function = "validate_blood_group"))]
    pub blood_group: Option<String>,
    #[validate(length(min = 5, message = "Address must be at least 5 characters"))]
    pub address: String,
    #[validate(length(min = 2, message = "City must be at least 2 characters"))]
    pub city: String,
    #[validate(length(min = 2, message = "State must be at least 2 characters"))]
    pub state: String,
    #[validate(custom(function = "validate_postal_code"))]
    pub postal_code: String,
    #[validate(length(min = 2, message = "Country must be at least 2 characters"))]
    pub country: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(custom(function = "validate_phone"))]
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub notes: Option<String>,
}

/// 환자 수정 요청. 생략한 필드는 유지됩니다.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    #[validate(custom(function = "validate_date"))]
    pub date_of_birth: Option<String>,
    #[validate(custom(function = "validate_gender"))]
    pub gender: Option<String>,
    #[validate(custom(function = "validate_blood_group"))]
    pub blood_group: Option<String>,
    #[validate(length(min = 5, message = "Address must be at least 5 characters"))]
    pub address: Option<String>,
    #[validate(length(min = 2, message = "City must be at least 2 characters"))]
    pub city: Option<String>,
    #[validate(length(min = 2, message = "State must be at least 2 characters"))]
    pub state: Option<String>,
    #[validate(custom(function = "validate_postal_code"))]
    pub postal_code: Option<String>,
    #[validate(length(min = 2, message = "Country must be at least 2 characters"))]
    pub country: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub notes: Option<String>,
}

fn date_of_birth(value: &str) -> ApiResult<chrono::NaiveDate> {
    parse_date(value)
        .ok_or_else(|| ApiError::validation("Invalid date format (expected YYYY-MM-DD)"))
}

fn blood_group(value: Option<&str>) -> ApiResult<Option<BloodGroup>> {
    Ok(value.map(str::parse::<BloodGroup>).transpose()?)
}

impl TryFrom<CreatePatientRequest> for PatientInput {
    type Error = ApiError;

    fn try_from(req: CreatePatientRequest) -> Result<Self, Self::Error> {
        Ok(PatientInput {
            date_of_birth: date_of_birth(&req.date_of_birth)?,
            gender: req.gender.parse::<Gender>()?,
            blood_group: blood_group(req.blood_group.as_deref())?,
            address: req.address,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            phone: req.phone,
            emergency_contact: req.emergency_contact,
            allergies: req.allergies,
            chronic_diseases: req.chronic_diseases,
            notes: req.notes,
        })
    }
}

impl TryFrom<UpdatePatientRequest> for PatientPatch {
    type Error = ApiError;

    fn try_from(req: UpdatePatientRequest) -> Result<Self, Self::Error> {
        Ok(PatientPatch {
            date_of_birth: req.date_of_birth.as_deref().map(date_of_birth).transpose()?,
            gender: req.gender.as_deref().map(str::parse::<Gender>).transpose()?,
            blood_group: blood_group(req.blood_group.as_deref())?,
            address: req.address,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            phone: req.phone,
            emergency_contact: req.emergency_contact,
            allergies: req.allergies,
            chronic_diseases: req.chronic_diseases,
            notes: req.notes,
        })
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Patient not found".to_string())
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 환자 목록
#[utoipa::path(
    get,
    path = "/api/patients",
    tag = "patients",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "환자 목록 (envelope의 data)", body = Vec<PatientWithUser>),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse)
    )
)]
pub async fn list_patients(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let patients = PatientRepository::list(pool).await?;
    debug!(count = patients.len(), "환자 목록 조회");

    Ok(ApiResponse::ok("Patients retrieved successfully", patients))
}

/// 환자 상세
#[utoipa::path(
    get,
    path = "/api/patients/{id}",
    tag = "patients",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "환자 ID")),
    responses(
        (status = 200, description = "환자 상세 (envelope의 data)", body = PatientDetail),
        (status = 404, description = "환자 없음", body = ApiErrorResponse)
    )
)]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let patient = PatientRepository::find_detail(pool, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::ok("Patient retrieved successfully", patient))
}

/// 환자 프로필 생성. 소유자는 요청한 사용자입니다.
#[utoipa::path(
    post,
    path = "/api/patients",
    tag = "patients",
    security(("bearer_auth" = [])),
    request_body = CreatePatientRequest,
    responses(
        (status = 201, description = "생성 완료 (envelope의 data)", body = PatientRecord),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 409, description = "프로필 중복", body = ApiErrorResponse)
    )
)]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreatePatientRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let input = PatientInput::try_from(req)?;

    let pool = state.db()?;
    let owner = Uuid::parse_str(&user.user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    let patient = PatientRepository::create(pool, owner, input)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Patient profile already exists".to_string())
            } else if is_foreign_key_violation(&e) {
                ApiError::BadRequest("User account does not exist".to_string())
            } else {
                ApiError::Database(e)
            }
        })?;

    info!(patient_id = %patient.id, user_id = %owner, "환자 프로필 생성");
    Ok(ApiResponse::created("Patient created successfully", patient))
}

/// 환자 정보 수정
#[utoipa::path(
    put,
    path = "/api/patients/{id}",
    tag = "patients",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "환자 ID")),
    request_body = UpdatePatientRequest,
    responses(
        (status = 200, description = "수정 완료 (envelope의 data)", body = PatientRecord),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 404, description = "환자 없음", body = ApiErrorResponse)
    )
)]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let patch = PatientPatch::try_from(req)?;

    let pool = state.db()?;
    let patient = PatientRepository::update(pool, id, patch)
        .await?
        .ok_or_else(not_found)?;

    info!(patient_id = %id, "환자 정보 수정");
    Ok(ApiResponse::ok("Patient updated successfully", patient))
}

/// 환자 삭제
#[utoipa::path(
    delete,
    path = "/api/patients/{id}",
    tag = "patients",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "환자 ID")),
    responses(
        (status = 200, description = "삭제 완료"),
        (status = 404, description = "환자 없음", body = ApiErrorResponse),
        (status = 409, description = "연관된 진료/예약 존재", body = ApiErrorResponse)
    )
)]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;

    let deleted = PatientRepository::delete(pool, id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            ApiError::Conflict("Patient has related consultations or appointments".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;
    if !deleted {
        return Err(not_found());
    }

    info!(patient_id = %id, "환자 삭제");
    Ok(ApiResponse::ok("Patient deleted successfully", ()))
}

// ================================================================================================
// Router
// ================================================================================================

/// 환자 라우터 생성. 모든 경로가 인증 게이트를 거칩니다.
pub fn patients_router(tokens: Arc<TokenService>) -> Router<Arc<AppState>> {
    let staff = Router::new()
        .route("/", get(list_patients))
        .route("/{id}", get(get_patient).put(update_patient))
        .route_layer(middleware::from_fn_with_state(
            RoleGate(Role::STAFF),
            require_roles,
        ));

    let admin = Router::new()
        .route("/{id}", delete(delete_patient))
        .route_layer(middleware::from_fn_with_state(
            RoleGate(Role::ADMIN_ONLY),
            require_roles,
        ));

    Router::new()
        .route("/", post(create_patient))
        .merge(staff)
        .merge(admin)
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
            .nest("/api/patients", patients_router(state.tokens.clone()))
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

    fn valid_patient() -> Value {
        json!({
            "dateOfBirth": "1985-06-15",
            "gender": "FEMALE",
            "bloodGroup": "B+",
            "address": "12 Lotus Lane",
            "city": "Pune",
            "state": "MH",
            "postalCode": "411001",
            "country": "India",
            "phone": "+91 9876 543210"
        })
    }

    fn create_request(auth: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/patients")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_create_request_converts() {
        let req: CreatePatientRequest = serde_json::from_value(valid_patient()).unwrap();
        assert!(req.validate().is_ok());

        let input = PatientInput::try_from(req).unwrap();
        assert_eq!(input.gender, Gender::Female);
        assert_eq!(input.blood_group, Some(BloodGroup::BPositive));
        assert_eq!(input.date_of_birth.to_string(), "1985-06-15");
    }

    #[test]
    fn test_empty_patch_is_valid() {
        let req = UpdatePatientRequest::default();
        assert!(req.validate().is_ok());

        let patch = PatientPatch::try_from(req).unwrap();
        assert!(patch.gender.is_none());
        assert!(patch.date_of_birth.is_none());
    }

    #[test]
    fn test_invalid_patch_fields() {
        let req: UpdatePatientRequest = serde_json::from_value(json!({
            "postalCode": "12",
            "city": "X",
            "gender": "UNKNOWN"
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("postal_code"));
        assert!(fields.contains_key("city"));
        assert!(fields.contains_key("gender"));
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let (app, _) = app();

        let (status, _) = send(
            app,
            Request::builder()
                .uri("/api/patients")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_forbidden_for_patient_role() {
        let (app, state) = app();

        let (status, json) = send(
            app,
            Request::builder()
                .uri("/api/patients")
                .header(header::AUTHORIZATION, bearer(&state, Role::Patient))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_list_allowed_for_staff() {
        let (app, state) = app();

        let (status, _) = send(
            app,
            Request::builder()
                .uri("/api/patients")
                .header(header::AUTHORIZATION, bearer(&state, Role::Receptionist))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        // 게이트 통과 후 DB 미설정
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let (app, state) = app();
        let uri = format!("/api/patients/{}", Uuid::new_v4());

        let (status, _) = send(
            app.clone(),
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header(header::AUTHORIZATION, bearer(&state, Role::Doctor))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            app,
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header(header::AUTHORIZATION, bearer(&state, Role::Admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_create_open_to_any_role() {
        let (app, state) = app();

        let (status, _) = send(
            app,
            create_request(&bearer(&state, Role::Patient), valid_patient()),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (app, state) = app();
        let mut body = valid_patient();
        body["dateOfBirth"] = json!("15/06/1985");
        body["phone"] = json!("call me");

        let (status, json) = send(
            app,
            create_request(&bearer(&state, Role::Patient), body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["details"].get("date_of_birth").is_some());
        assert!(json["details"].get("phone").is_some());
    }
}
