//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설치하고 핸들을 반환합니다.
///
/// 레코더는 프로세스당 한 번만 설치할 수 있습니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()
}

// ============================================================================
// HTTP 메트릭
// ============================================================================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증 메트릭
// ============================================================================

/// 인가 게이트 판정 카운터.
///
/// outcome: `authenticated`, `missing_header`, `invalid_scheme`, `malformed`,
/// `invalid_signature`, `expired`, `forbidden`, `internal`
pub fn record_auth_decision(outcome: &'static str) {
    counter!("auth_gate_decisions_total", "outcome" => outcome).increment(1);
}

/// 로그인/토큰 갱신 결과 카운터.
pub fn record_login(kind: &'static str, success: bool) {
    counter!(
        "auth_logins_total",
        "kind" => kind,
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

// ============================================================================
// 경로 정규화
// ============================================================================

/// 경로의 UUID 세그먼트를 `:id`로 정규화합니다.
///
/// 예: `/api/patients/123e4567-e89b-12d3-a456-426614174000` → `/api/patients/:id`
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/patients/123e4567-e89b-12d3-a456-426614174000";
        assert_eq!(normalize_path(path), "/api/patients/:id");
    }

    #[test]
    fn test_normalize_path_nested() {
        let path = "/api/consultations/123e4567-e89b-12d3-a456-426614174000/prescriptions";
        assert_eq!(normalize_path(path), "/api/consultations/:id/prescriptions");
    }

    #[test]
    fn test_normalize_path_no_params() {
        assert_eq!(normalize_path("/api/auth/login"), "/api/auth/login");
    }
}
