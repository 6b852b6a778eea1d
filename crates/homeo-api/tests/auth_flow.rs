//! 인증 흐름 통합 테스트.
//!
//! 토큰 발급 → 게이트 → 역할 검사 전체 경로를 라우터 수준에서 검증합니다.
//! 데이터베이스 없이 실행되므로 게이트를 통과한 요청은 503으로 끝납니다.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use homeo_api::auth::{authenticate, require_roles, CurrentUser, Role, RoleGate, TokenPayload};
use homeo_api::{create_api_router, create_test_state, AppState};
use proptest::prelude::*;
use serde_json::Value;
use tower::ServiceExt;

const DOCTOR_OR_ADMIN: &[Role] = &[Role::Doctor, Role::Admin];

fn doctor() -> TokenPayload {
    TokenPayload::new("u1", "a@b.com", Role::Doctor)
}

async fn echo(CurrentUser(user): CurrentUser) -> Json<TokenPayload> {
    Json(user)
}

/// `/clinical`은 DOCTOR/ADMIN, `/admin`은 ADMIN만 허용.
fn gated_router(state: &AppState) -> Router {
    Router::new()
        .route(
            "/clinical",
            get(echo).layer(middleware::from_fn_with_state(
                RoleGate(DOCTOR_OR_ADMIN),
                require_roles,
            )),
        )
        .route(
            "/admin",
            get(echo).layer(middleware::from_fn_with_state(
                RoleGate(Role::ADMIN_ONLY),
                require_roles,
            )),
        )
        .layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            authenticate,
        ))
}

async fn call(app: Router, method: &str, uri: &str, auth: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(AUTHORIZATION, auth);
    }
    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn doctor_passes_doctor_or_admin_gate() {
    let state = create_test_state();
    let token = state.tokens.issue_access(&doctor()).unwrap();

    let (status, body) = call(
        gated_router(&state),
        "GET",
        "/clinical",
        Some(format!("Bearer {}", token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["role"], "DOCTOR");
}

#[tokio::test]
async fn doctor_is_forbidden_at_admin_gate() {
    let state = create_test_state();
    let token = state.tokens.issue_access(&doctor()).unwrap();

    let (status, body) = call(
        gated_router(&state),
        "GET",
        "/admin",
        Some(format!("Bearer {}", token)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let state = create_test_state();

    let (status, body) = call(gated_router(&state), "GET", "/clinical", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing or invalid authorization header");
}

#[tokio::test]
async fn refresh_token_is_rejected_at_gate() {
    let state = create_test_state();
    let refresh = state.tokens.issue_refresh(&doctor()).unwrap();

    let (status, body) = call(
        gated_router(&state),
        "GET",
        "/clinical",
        Some(format!("Bearer {}", refresh)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn token_from_other_deployment_is_rejected() {
    let state = create_test_state();
    let foreign = homeo_api::TokenService::new(
        &homeo_core::AuthConfig::new(
            "another-deployment-access-secret-0123456789",
            "another-deployment-refresh-secret-0123456789",
        )
        .unwrap(),
    );
    let token = foreign.issue_access(&doctor()).unwrap();

    let (status, _) = call(
        gated_router(&state),
        "GET",
        "/clinical",
        Some(format!("Bearer {}", token)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_router_applies_role_gates() {
    let state = Arc::new(create_test_state());
    let app = create_api_router(state.tokens.clone()).with_state(state.clone());
    let bearer = |role| {
        let payload = TokenPayload::new(uuid::Uuid::new_v4().to_string(), "a@b.com", role);
        Some(format!("Bearer {}", state.tokens.issue_access(&payload).unwrap()))
    };
    let patient_uri = format!("/api/patients/{}", uuid::Uuid::new_v4());

    // 진료: ADMIN, DOCTOR만
    let (status, _) = call(app.clone(), "GET", "/api/consultations", bearer(Role::Doctor)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = call(app.clone(), "GET", "/api/consultations", bearer(Role::Patient)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 환자 삭제: ADMIN만
    let (status, _) = call(app.clone(), "DELETE", &patient_uri, bearer(Role::Doctor)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(app.clone(), "DELETE", &patient_uri, bearer(Role::Admin)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // 인증 없음
    let (status, _) = call(app.clone(), "GET", "/api/appointments", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 헬스 체크는 공개
    let (status, _) = call(app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn gate_decision_matches_role_membership(
        user_id in "[a-z0-9]{1,16}",
        role in role_strategy(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let state = create_test_state();
        let payload = TokenPayload::new(user_id.clone(), "p@example.com", role);
        let token = state.tokens.issue_access(&payload).unwrap();

        let (status, body) = runtime.block_on(call(
            gated_router(&state),
            "GET",
            "/clinical",
            Some(format!("Bearer {}", token)),
        ));

        if DOCTOR_OR_ADMIN.contains(&role) {
            prop_assert_eq!(status, StatusCode::OK);
            prop_assert_eq!(body["userId"].as_str(), Some(user_id.as_str()));
        } else {
            prop_assert_eq!(status, StatusCode::FORBIDDEN);
        }
    }
}
