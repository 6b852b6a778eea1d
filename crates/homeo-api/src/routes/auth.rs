//! 인증 API 라우트.
//!
//! # 엔드포인트
//!
//! - `POST /api/auth/register` - 회원가입 (DOCTOR, PATIENT만 가능)
//! - `POST /api/auth/login` - 로그인
//! - `POST /api/auth/refresh` - access 토큰 재발급
//! - `GET /api/auth/me` - 현재 사용자 정보 (인증 필요)
//! - `PUT /api/auth/password` - 비밀번호 변경 (인증 필요)

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{authenticate, CurrentUser, Role, TokenPair, TokenPayload, TokenService};
use crate::error::{ApiError, ApiErrorResponse, ApiResponse, ApiResult};
use crate::metrics::record_login;
use crate::repository::{is_unique_violation, NewUser, UserRecord, UserRepository};
use crate::state::AppState;
use crate::validation::validate_password;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ================================================================================================
// Request/Response Types
// ================================================================================================

/// 회원가입 요청.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    pub confirm_password: String,
    /// DOCTOR | PATIENT
    #[validate(custom(function = "validate_registrable_role"))]
    pub role: String,
}

/// 로그인 요청.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// 토큰 재발급 요청.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// 비밀번호 변경 요청.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,
}

/// 회원가입/로그인 응답. 토큰 필드는 최상위로 펼쳐집니다.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserRecord,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// 토큰 재발급 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

fn validate_registrable_role(value: &str) -> Result<(), ValidationError> {
    match Role::parse(value) {
        Some(role) if role.is_self_registrable() => Ok(()),
        _ => Err(ValidationError::new("role")
            .with_message("Role must be DOCTOR or PATIENT".into())),
    }
}

/// 이메일 정규화 (앞뒤 공백 제거, 소문자).
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn user_id(payload: &TokenPayload) -> ApiResult<Uuid> {
    Uuid::parse_str(&payload.user_id)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
}

/// 현재 레코드 기준으로 토큰 페어를 발급합니다.
fn issue_for(state: &AppState, user: &UserRecord) -> ApiResult<TokenPair> {
    let payload = user.token_payload().ok_or_else(|| {
        ApiError::Internal(format!("user {} has unknown role {}", user.id, user.role))
    })?;
    Ok(state.tokens.issue_pair(&payload)?)
}

// ================================================================================================
// Handlers
// ================================================================================================

/// 회원가입.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 완료 (envelope의 data)", body = AuthResponse),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 409, description = "이미 등록된 이메일", body = ApiErrorResponse),
        (status = 503, description = "데이터베이스 미설정", body = ApiErrorResponse)
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    if req.password != req.confirm_password {
        return Err(ApiError::Validation {
            message: "Passwords do not match".to_string(),
            details: Some(serde_json::json!({ "confirmPassword": ["Passwords do not match"] })),
        });
    }
    let role = Role::parse(&req.role)
        .ok_or_else(|| ApiError::validation("Role must be DOCTOR or PATIENT"))?;

    let pool = state.db()?;
    let email = normalize_email(&req.email);

    if UserRepository::email_exists(pool, &email).await? {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = state.hasher.hash_blocking(req.password).await?;

    let user = UserRepository::create(
        pool,
        NewUser {
            email,
            password_hash,
            first_name: req.first_name.trim().to_string(),
            last_name: req.last_name.trim().to_string(),
            role,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Email already registered".to_string())
        } else {
            ApiError::Database(e)
        }
    })?;

    let tokens = issue_for(&state, &user)?;
    info!(user_id = %user.id, role = %role, "사용자 등록 완료");

    Ok(ApiResponse::created(
        "User registered successfully",
        AuthResponse { user, tokens },
    ))
}

/// 로그인.
///
/// 알 수 없는 이메일, 틀린 비밀번호, 비활성 계정 모두 같은 401을 반환합니다.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공 (envelope의 data)", body = AuthResponse),
        (status = 400, description = "검증 실패", body = ApiErrorResponse),
        (status = 401, description = "자격 증명 불일치", body = ApiErrorResponse),
        (status = 503, description = "데이터베이스 미설정", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let pool = state.db()?;
    let email = normalize_email(&req.email);

    let reject = |reason: &'static str| {
        warn!(reason, "로그인 실패");
        record_login("password", false);
        ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
    };

    let Some(user) = UserRepository::find_by_email(pool, &email).await? else {
        // 없는 계정도 검증 한 번의 비용을 치름
        state.hasher.verify_dummy_blocking(req.password).await?;
        return Err(reject("unknown_email"));
    };

    let verified = state
        .hasher
        .verify_blocking(req.password, user.password_hash.clone())
        .await?;
    if !verified {
        return Err(reject("wrong_password"));
    }
    if !user.is_active() {
        return Err(reject("inactive_account"));
    }

    let tokens = issue_for(&state, &user)?;
    record_login("password", true);
    info!(user_id = %user.id, "로그인 성공");

    Ok(ApiResponse::ok(
        "Login successful",
        AuthResponse { user, tokens },
    ))
}

/// Access 토큰 재발급.
///
/// refresh 토큰을 먼저 검증한 뒤 사용자를 다시 조회하여, 삭제되었거나
/// 비활성화된 계정은 거부하고 현재 레코드로 access 토큰을 발급합니다.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "재발급 성공 (envelope의 data)", body = RefreshResponse),
        (status = 400, description = "refresh 토큰 누락", body = ApiErrorResponse),
        (status = 401, description = "유효하지 않은 토큰 또는 계정", body = ApiErrorResponse),
        (status = 503, description = "데이터베이스 미설정", body = ApiErrorResponse)
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.refresh_token.trim().is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required".to_string()));
    }

    let claimed = state.tokens.verify_refresh(&req.refresh_token).map_err(|err| {
        warn!(kind = err.kind(), error = %err, "Refresh token rejected");
        record_login("refresh", false);
        ApiError::from(err)
    })?;

    let pool = state.db()?;
    let id = user_id(&claimed)?;

    let user = UserRepository::find_by_id(pool, id).await?;
    let payload = match user {
        Some(user) if user.is_active() => user.token_payload(),
        Some(user) => {
            warn!(
                user_id = %user.id,
                status = %user.status,
                "Refresh refused for inactive account"
            );
            None
        }
        None => {
            warn!(user_id = %id, "Refresh refused for missing account");
            None
        }
    };
    let Some(payload) = payload else {
        record_login("refresh", false);
        return Err(ApiError::Unauthorized("Invalid or expired token".to_string()));
    };

    let access_token = state.tokens.issue_access(&payload)?;
    record_login("refresh", true);
    debug!(user_id = %payload.user_id, "Access token refreshed");

    Ok(ApiResponse::ok(
        "Token refreshed successfully",
        RefreshResponse { access_token },
    ))
}

/// 현재 사용자 정보.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "현재 사용자 (envelope의 data)", body = UserRecord),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse)
    )
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(payload): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let pool = state.db()?;
    let id = user_id(&payload)?;

    let user = UserRepository::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// 비밀번호 변경.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "변경 완료"),
        (status = 400, description = "검증 실패 또는 현재 비밀번호 불일치", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(payload): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    if req.current_password == req.new_password {
        return Err(ApiError::validation(
            "New password must differ from the current password",
        ));
    }

    let pool = state.db()?;
    let id = user_id(&payload)?;

    let user = UserRepository::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let verified = state
        .hasher
        .verify_blocking(req.current_password, user.password_hash)
        .await?;
    if !verified {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = state.hasher.hash_blocking(req.new_password).await?;
    if !UserRepository::update_password(pool, id, &password_hash).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    info!(user_id = %id, "비밀번호 변경 완료");
    Ok(ApiResponse::ok("Password changed successfully", ()))
}

// ================================================================================================
// Router
// ================================================================================================

/// 인증 라우터 생성. `/me`, `/password`만 게이트를 거칩니다.
pub fn auth_router(tokens: Arc<TokenService>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me))
        .route("/password", put(change_password))
        .route_layer(middleware::from_fn_with_state(tokens, authenticate));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
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
            .nest("/api/auth", auth_router(state.tokens.clone()))
            .with_state(state.clone());
        (router, state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn registration() -> Value {
        json!({
            "email": "doctor@example.com",
            "firstName": "Samuel",
            "lastName": "Hahnemann",
            "password": "similia123",
            "confirmPassword": "similia123",
            "role": "DOCTOR"
        })
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Doc@Example.COM "), "doc@example.com");
    }

    #[test]
    fn test_registrable_roles() {
        assert!(validate_registrable_role("DOCTOR").is_ok());
        assert!(validate_registrable_role("PATIENT").is_ok());
        assert!(validate_registrable_role("ADMIN").is_err());
        assert!(validate_registrable_role("RECEPTIONIST").is_err());
        assert!(validate_registrable_role("doctor").is_err());
    }

    #[test]
    fn test_auth_response_flattens_tokens() {
        let now = chrono::Utc::now();
        let response = AuthResponse {
            user: UserRecord {
                id: Uuid::new_v4(),
                email: "doctor@example.com".to_string(),
                password_hash: "digest".to_string(),
                first_name: "Samuel".to_string(),
                last_name: "Hahnemann".to_string(),
                role: "DOCTOR".to_string(),
                status: "ACTIVE".to_string(),
                phone: None,
                created_at: now,
                updated_at: now,
            },
            tokens: TokenPair {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_in: 3600,
                token_type: "Bearer".to_string(),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["expiresIn"], 3600);
        assert_eq!(json["tokenType"], "Bearer");
        assert_eq!(json["user"]["firstName"], "Samuel");
        assert!(json["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let (app, _) = app();
        let mut body = registration();
        body["email"] = json!("not-an-email");
        body["password"] = json!("short");
        body["role"] = json!("ADMIN");

        let (status, json) = send(app, post_json("/api/auth/register", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        let details = &json["details"];
        assert!(details.get("email").is_some());
        assert!(details.get("password").is_some());
        assert!(details.get("role").is_some());
    }

    #[tokio::test]
    async fn test_register_password_mismatch() {
        let (app, _) = app();
        let mut body = registration();
        body["confirmPassword"] = json!("different123");

        let (status, json) = send(app, post_json("/api/auth/register", body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Passwords do not match");
    }

    #[tokio::test]
    async fn test_register_without_database() {
        let (app, _) = app();

        let (status, json) = send(app, post_json("/api/auth/register", registration())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let (app, _) = app();

        let (status, json) = send(app, post_json("/api/auth/login", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_refresh_requires_token() {
        let (app, _) = app();

        let (status, json) = send(app, post_json("/api/auth/refresh", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Refresh token is required");
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (app, state) = app();
        let payload = TokenPayload::new(Uuid::new_v4().to_string(), "a@b.com", Role::Doctor);
        let access = state.tokens.issue_access(&payload).unwrap();

        let (status, json) = send(
            app,
            post_json("/api/auth/refresh", json!({ "refreshToken": access })),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_refresh_verifies_before_database() {
        let (app, state) = app();
        let payload = TokenPayload::new(Uuid::new_v4().to_string(), "a@b.com", Role::Doctor);
        let refresh = state.tokens.issue_refresh(&payload).unwrap();

        let (status, _) = send(
            app,
            post_json("/api/auth/refresh", json!({ "refreshToken": refresh })),
        )
        .await;

        // 서명이 유효한 토큰만 사용자 재조회 단계까지 도달
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_me_requires_authentication() {
        let (app, _) = app();

        let (status, json) = send(
            app,
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Missing or invalid authorization header");
    }

    #[tokio::test]
    async fn test_me_with_valid_token_reaches_handler() {
        let (app, state) = app();
        let payload = TokenPayload::new(Uuid::new_v4().to_string(), "a@b.com", Role::Patient);
        let access = state.tokens.issue_access(&payload).unwrap();

        let (status, _) = send(
            app,
            Request::builder()
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_change_password_rejects_same_password() {
        let (app, state) = app();
        let payload = TokenPayload::new(Uuid::new_v4().to_string(), "a@b.com", Role::Patient);
        let access = state.tokens.issue_access(&payload).unwrap();

        let (status, json) = send(
            app,
            Request::builder()
                .method("PUT")
                .uri("/api/auth/password")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "currentPassword": "similia123", "newPassword": "similia123" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}
