//! API 에러 및 응답 봉투.
//!
//! 성공 응답은 `{success, message, data, timestamp}`,
//! 실패 응답은 [`ApiErrorResponse`] 형식으로 직렬화됩니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{PasswordError, TokenError};

/// 에러 응답 본문.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "Patient not found",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// API 핸들러 Result 타입.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// 데이터베이스 미설정.
    pub fn database_unavailable() -> Self {
        ApiError::ServiceUnavailable("Database not configured".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Database(_) => "DB_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn to_body(&self) -> ApiErrorResponse {
        match self {
            ApiError::Validation {
                message,
                details: Some(details),
            } => ApiErrorResponse::with_details(self.code(), message, details.clone()),
            // 내부 상세는 로그에만 남김
            ApiError::Database(_) | ApiError::Internal(_) => {
                ApiErrorResponse::new(self.code(), "Internal server error")
            }
            other => ApiErrorResponse::new(other.code(), other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Database(_) | ApiError::Internal(_)) {
            error!(error = %self, "Request failed");
        }
        (self.status(), Json(self.to_body())).into_response()
    }
}

/// 필드별 메시지를 모읍니다. 중첩 구조는 `items[0].dosage` 형태의 키로 펼칩니다.
fn collect_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    details: &mut serde_json::Map<String, Value>,
    messages: &mut Vec<String>,
) {
    use validator::ValidationErrorsKind;

    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(field, _)| field.to_string());

    for (field, kind) in fields {
        let key = format!("{}{}", prefix, field);
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let field_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{}: invalid value", key))
                    })
                    .collect();
                messages.extend(field_messages.iter().cloned());
                details.insert(key, Value::from(field_messages));
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_validation_errors(&format!("{}.", key), inner, details, messages);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_errors(
                        &format!("{}[{}].", key, index),
                        inner,
                        details,
                        messages,
                    );
                }
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details = serde_json::Map::new();
        let mut messages = Vec::new();
        collect_validation_errors("", &errors, &mut details, &mut messages);

        ApiError::Validation {
            message: messages.join("; "),
            details: Some(Value::Object(details)),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(detail) => ApiError::Internal(detail),
            _ => ApiError::Unauthorized("Invalid or expired token".to_string()),
        }
    }
}

impl From<homeo_core::HomeoError> for ApiError {
    fn from(err: homeo_core::HomeoError) -> Self {
        match err {
            homeo_core::HomeoError::InvalidValue { .. } => ApiError::validation(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// 성공 응답 봉투.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    /// RFC 3339 타임스탬프
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// 200 OK 응답.
    pub fn ok(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::OK, Json(Self::new(message, data)))
    }

    /// 201 Created 응답.
    pub fn created(message: impl Into<String>, data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Json(Self::new(message, data)))
    }
}
