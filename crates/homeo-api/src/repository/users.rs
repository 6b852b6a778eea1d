//! User Repository
//!
//! 계정과 자격 증명(비밀번호 해시)을 관리합니다.

use chrono::{DateTime, Utc};
use homeo_core::UserStatus;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Role, TokenPayload};

/// 사용자 레코드.
///
/// 비밀번호 해시는 직렬화되지 않습니다.
#[derive(Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    /// ADMIN | DOCTOR | PATIENT | RECEPTIONIST
    pub role: String,
    /// ACTIVE | INACTIVE | SUSPENDED
    pub status: String,
    #[sqlx(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl UserRecord {
    /// 저장된 역할 태그를 해석합니다.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// 로그인/토큰 갱신이 허용되는 계정인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.status
            .parse::<UserStatus>()
            .map(|status| status.is_active())
            .unwrap_or(false)
    }

    /// 현재 레코드 기준의 토큰 페이로드. 역할 태그가 알 수 없는 값이면 None.
    pub fn token_payload(&self) -> Option<TokenPayload> {
        self.role()
            .map(|role| TokenPayload::new(self.id.to_string(), self.email.clone(), role))
    }
}

/// 새 사용자 입력.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// User Repository
pub struct UserRepository;

impl UserRepository {
    /// 이메일로 조회 (대소문자 무시).
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// ID로 조회.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 의사 계정 조회. 역할이 DOCTOR가 아니면 None.
    pub async fn find_doctor(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1 AND role = $2")
            .bind(id)
            .bind(Role::Doctor.as_str())
            .fetch_optional(pool)
            .await
    }

    /// 이메일 사용 여부.
    pub async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))",
        )
        .bind(email)
        .fetch_one(pool)
        .await
    }

    /// 사용자 생성. 상태는 ACTIVE로 시작합니다.
    pub async fn create(pool: &PgPool, input: NewUser) -> Result<UserRecord, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, role, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.role.as_str())
        .bind(UserStatus::Active.as_str())
        .fetch_one(pool)
        .await
    }

    /// 비밀번호 해시 교체.
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(role: &str, status: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "doc@example.com".to_string(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            first_name: "Samuel".to_string(),
            last_name: "Hahnemann".to_string(),
            role: role.to_string(),
            status: status.to_string(),
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = record("DOCTOR", "ACTIVE");
        let json = serde_json::to_string(&user).unwrap();

        assert!(!json.contains("argon2"));
        assert!(!json.contains("passwordHash"));
        assert!(json.contains("\"firstName\":\"Samuel\""));
        assert!(!format!("{:?}", user).contains("argon2"));
    }

    #[test]
    fn test_token_payload_from_record() {
        let user = record("DOCTOR", "ACTIVE");
        let payload = user.token_payload().unwrap();

        assert_eq!(payload.user_id, user.id.to_string());
        assert_eq!(payload.role, Role::Doctor);
        assert!(record("NURSE", "ACTIVE").token_payload().is_none());
    }

    #[test]
    fn test_only_active_records_are_active() {
        assert!(record("PATIENT", "ACTIVE").is_active());
        assert!(!record("PATIENT", "SUSPENDED").is_active());
        assert!(!record("PATIENT", "garbage").is_active());
    }
}
