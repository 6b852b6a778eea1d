//! 인증 및 권한 부여.
//!
//! # 구성 요소
//!
//! - [`CredentialHasher`]: Argon2id 비밀번호 해싱/검증
//! - [`TokenService`]: access/refresh JWT 발급 및 검증
//! - [`authenticate`], [`require_roles`]: 인가 게이트 미들웨어
//! - [`CurrentUser`]: 인증된 신원 추출기
//! - [`Role`]: 사용자 역할 (ADMIN, DOCTOR, PATIENT, RECEPTIONIST)
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
//!     format!("Hello, {}!", user.email)
//! }
//! ```

mod jwt;
mod middleware;
mod password;
mod roles;

pub use jwt::{Claims, TokenError, TokenKind, TokenPair, TokenPayload, TokenService};
pub use middleware::{
    authenticate, authenticate_header, authorize, parse_bearer, require_roles, AuthError,
    AuthenticatedUser, CurrentUser, RoleGate, UnauthorizedReason,
};
pub use password::{validate_password_strength, CredentialHasher, PasswordError};
pub use roles::Role;
