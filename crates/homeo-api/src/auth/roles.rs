//! 역할 기반 접근 제어 (RBAC).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 사용자 역할.
///
/// 닫힌 집합입니다. 토큰의 `role` 클레임이 이 집합 밖이면 토큰 자체가 잘못된 것으로 취급됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// 관리자
    Admin,
    /// 의사
    Doctor,
    /// 환자
    Patient,
    /// 접수 담당
    Receptionist,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Doctor, Role::Patient, Role::Receptionist];

    /// 의료진/행정 직원 역할 (환자 기록 조회 가능).
    pub const STAFF: &'static [Role] = &[Role::Admin, Role::Doctor, Role::Receptionist];

    /// 진료 기록 접근 역할.
    pub const CLINICAL: &'static [Role] = &[Role::Admin, Role::Doctor];

    /// 관리자 전용.
    pub const ADMIN_ONLY: &'static [Role] = &[Role::Admin];

    /// 데이터베이스/와이어 태그.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::Patient => "PATIENT",
            Role::Receptionist => "RECEPTIONIST",
        }
    }

    /// 문자열에서 역할 파싱. 대소문자를 구분합니다.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    /// 자가 가입으로 선택할 수 있는 역할인지 확인.
    pub fn is_self_registrable(&self) -> bool {
        matches!(self, Role::Doctor | Role::Patient)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("RECEPTIONIST"), Some(Role::Receptionist));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse("NURSE"), None);
    }

    #[test]
    fn test_role_serde_is_screaming_case() {
        let json = serde_json::to_string(&Role::Doctor).unwrap();
        assert_eq!(json, "\"DOCTOR\"");

        let role: Role = serde_json::from_str("\"PATIENT\"").unwrap();
        assert_eq!(role, Role::Patient);

        assert!(serde_json::from_str::<Role>("\"SUPERUSER\"").is_err());
    }

    #[test]
    fn test_self_registration_roles() {
        assert!(Role::Doctor.is_self_registrable());
        assert!(Role::Patient.is_self_registrable());
        assert!(!Role::Admin.is_self_registrable());
        assert!(!Role::Receptionist.is_self_registrable());
    }
}
