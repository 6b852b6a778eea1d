//! 클리닉 백엔드 공통 에러 타입.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum HomeoError {
    /// 설정 에러
    #[error("configuration error: {0}")]
    Config(String),

    /// 도메인 값 파싱 실패 (알 수 없는 열거형 태그 등)
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// 직렬화 에러
    #[error("serialization error: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("internal error: {0}")]
    Internal(String),
}

/// 코어 작업을 위한 Result 타입.
pub type HomeoResult<T> = Result<T, HomeoError>;

impl HomeoError {
    /// 기동을 중단해야 하는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HomeoError::Config(_) | HomeoError::Internal(_))
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        HomeoError::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

impl From<serde_json::Error> for HomeoError {
    fn from(err: serde_json::Error) -> Self {
        HomeoError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for HomeoError {
    fn from(err: config::ConfigError) -> Self {
        HomeoError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fatal() {
        assert!(HomeoError::Config("missing JWT_SECRET".to_string()).is_fatal());
        assert!(!HomeoError::invalid("gender", "UNKNOWN").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = HomeoError::invalid("status", "DONE");
        assert_eq!(err.to_string(), "invalid value for status: DONE");
    }
}
