//! 인가 게이트.
//!
//! 요청 처리 순서: `authenticate` → `require_roles` (선택) → 핸들러.
//!
//! - `authenticate`: `Authorization: Bearer <token>` 헤더를 access 토큰으로 검증하고
//!   [`AuthenticatedUser`]를 요청 extensions에 넣습니다.
//! - `require_roles`: 허용 역할 집합 밖이면 403. 신원이 없으면 배선 오류이므로 500.
//! - [`CurrentUser`]: 핸들러에서 신원을 꺼내는 추출기.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, warn};

use super::{Role, TokenError, TokenPayload, TokenService};
use crate::error::ApiErrorResponse;
use crate::metrics::record_auth_decision;

/// 게이트를 통과한 요청의 신원. 요청 extensions에만 존재합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub TokenPayload);

/// 401 사유. 클라이언트에는 두 가지 메시지로만 노출됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// Authorization 헤더 없음
    MissingHeader,
    /// `Bearer <token>` 형식이 아님
    InvalidScheme,
    /// 토큰 검증 실패
    InvalidToken(TokenError),
}

impl UnauthorizedReason {
    pub fn client_message(&self) -> &'static str {
        match self {
            UnauthorizedReason::MissingHeader | UnauthorizedReason::InvalidScheme => {
                "Missing or invalid authorization header"
            }
            UnauthorizedReason::InvalidToken(_) => "Invalid or expired token",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            UnauthorizedReason::MissingHeader => "missing_header",
            UnauthorizedReason::InvalidScheme => "invalid_scheme",
            UnauthorizedReason::InvalidToken(err) => err.kind(),
        }
    }
}

/// 게이트 에러.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("{}", .0.client_message())]
    Unauthorized(UnauthorizedReason),
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse::new(self.code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

/// Authorization 헤더에서 토큰을 꺼냅니다.
///
/// `Bearer`는 대소문자를 구분하며 공백은 정확히 하나여야 합니다.
/// 토큰은 비어 있지 않고 공백을 포함하지 않아야 합니다.
pub fn parse_bearer(header: Option<&HeaderValue>) -> Result<&str, UnauthorizedReason> {
    let value = header.ok_or(UnauthorizedReason::MissingHeader)?;
    let value = value
        .to_str()
        .map_err(|_| UnauthorizedReason::InvalidScheme)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(UnauthorizedReason::InvalidScheme)?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(UnauthorizedReason::InvalidScheme);
    }

    Ok(token)
}

/// 헤더를 검증해 신원을 얻습니다.
pub fn authenticate_header(
    tokens: &TokenService,
    header: Option<&HeaderValue>,
) -> Result<TokenPayload, AuthError> {
    let token = parse_bearer(header).map_err(AuthError::Unauthorized)?;

    tokens.verify_access(token).map_err(|err| {
        // 구체적인 실패 종류는 서버 로그에만 남김
        warn!(kind = err.kind(), error = %err, "Access token rejected");
        AuthError::Unauthorized(UnauthorizedReason::InvalidToken(err))
    })
}

/// 허용 역할 검사.
pub fn authorize(user: Option<&AuthenticatedUser>, allowed: &[Role]) -> Result<(), AuthError> {
    let Some(AuthenticatedUser(payload)) = user else {
        error!("Role gate reached without an authenticated identity");
        return Err(AuthError::Internal);
    };

    if allowed.contains(&payload.role) {
        Ok(())
    } else {
        warn!(
            user_id = %payload.user_id,
            role = %payload.role,
            ?allowed,
            "Role not permitted"
        );
        Err(AuthError::Forbidden)
    }
}

/// 인증 미들웨어.
///
/// ```rust,ignore
/// router.layer(middleware::from_fn_with_state(tokens, authenticate))
/// ```
pub async fn authenticate(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match authenticate_header(&tokens, req.headers().get(AUTHORIZATION)) {
        Ok(payload) => {
            debug!(user_id = %payload.user_id, role = %payload.role, "Request authenticated");
            record_auth_decision("authenticated");
            req.extensions_mut().insert(AuthenticatedUser(payload));
            Ok(next.run(req).await)
        }
        Err(err) => {
            if let AuthError::Unauthorized(reason) = &err {
                if !matches!(reason, UnauthorizedReason::InvalidToken(_)) {
                    warn!(reason = reason.label(), "Authorization header rejected");
                }
                record_auth_decision(reason.label());
            }
            Err(err)
        }
    }
}

/// 역할 게이트 상태. 허용 역할 집합을 담습니다.
#[derive(Debug, Clone, Copy)]
pub struct RoleGate(pub &'static [Role]);

/// 역할 게이트 미들웨어. `authenticate` 안쪽에 배치해야 합니다.
///
/// ```rust,ignore
/// get(handler).layer(middleware::from_fn_with_state(RoleGate(Role::STAFF), require_roles))
/// ```
pub async fn require_roles(
    State(RoleGate(allowed)): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match authorize(req.extensions().get::<AuthenticatedUser>(), allowed) {
        Ok(()) => Ok(next.run(req).await),
        Err(err) => {
            record_auth_decision(if err == AuthError::Forbidden {
                "forbidden"
            } else {
                "internal"
            });
            Err(err)
        }
    }
}

/// 현재 사용자 추출기.
///
/// ```rust,ignore
/// async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub TokenPayload);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|AuthenticatedUser(payload)| CurrentUser(payload.clone()))
            .ok_or_else(|| {
                error!("CurrentUser extracted on a route without the authentication gate");
                AuthError::Internal
            })
    }
}
