//! Patient Repository
//!
//! 환자 프로필과 연관 진료/예약 요약을 관리합니다.

use chrono::{DateTime, NaiveDate, Utc};
use homeo_core::{BloodGroup, Gender};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

use super::appointments::AppointmentRecord;
use super::consultations::ConsultationRecord;

/// 최근 이력 조회 개수.
const RECENT_LIMIT: i64 = 5;

/// 환자 레코드
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date_of_birth: NaiveDate,
    /// MALE | FEMALE | OTHER
    pub gender: String,
    /// "O+", "AB-" 등
    #[sqlx(default)]
    pub blood_group: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    #[sqlx(default)]
    pub emergency_contact: Option<String>,
    #[sqlx(default)]
    pub allergies: Option<String>,
    #[sqlx(default)]
    pub chronic_diseases: Option<String>,
    #[sqlx(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 환자 + 계정 이름/이메일
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub patient: PatientRecord,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// 환자 상세 (최근 진료 5건, 최근 예약 5건)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: PatientWithUser,
    pub consultations: Vec<ConsultationRecord>,
    pub appointments: Vec<AppointmentRecord>,
}

/// 새 환자 입력 (검증 완료)
#[derive(Debug, Clone)]
pub struct PatientInput {
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub notes: Option<String>,
}

/// 부분 업데이트 입력. None인 필드는 유지됩니다.
#[derive(Debug, Clone, Default)]
pub struct PatientPatch {
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub notes: Option<String>,
}

const SELECT_WITH_USER: &str = r#"
    SELECT p.*, u.email, u.first_name, u.last_name
    FROM patients p
    JOIN users u ON u.id = p.user_id
"#;

/// Patient Repository
pub struct PatientRepository;

impl PatientRepository {
    /// 전체 환자 조회 (최근 등록순)
    pub async fn list(pool: &PgPool) -> Result<Vec<PatientWithUser>, sqlx::Error> {
        sqlx::query_as::<_, PatientWithUser>(&format!(
            "{} ORDER BY p.created_at DESC",
            SELECT_WITH_USER
        ))
        .fetch_all(pool)
        .await
    }

    /// 환자 조회
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<PatientWithUser>, sqlx::Error> {
        sqlx::query_as::<_, PatientWithUser>(&format!("{} WHERE p.id = $1", SELECT_WITH_USER))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 환자 상세 조회 (최근 이력 포함)
    pub async fn find_detail(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<PatientDetail>, sqlx::Error> {
        let Some(patient) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let consultations = sqlx::query_as::<_, ConsultationRecord>(
            r#"
            SELECT * FROM consultations
            WHERE patient_id = $1
            ORDER BY scheduled_at DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await?;

        let appointments = sqlx::query_as::<_, AppointmentRecord>(
            r#"
            SELECT * FROM appointments
            WHERE patient_id = $1
            ORDER BY appointment_date DESC, appointment_time DESC
            LIMIT $2
            "#,
        )
        .bind(id)
        .bind(RECENT_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(Some(PatientDetail {
            patient,
            consultations,
            appointments,
        }))
    }

    /// 환자 존재 여부
    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM patients WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// 환자 생성. 소유자는 요청한 사용자입니다.
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        input: PatientInput,
    ) -> Result<PatientRecord, sqlx::Error> {
        sqlx::query_as::<_, PatientRecord>(
            r#"
            INSERT INTO patients (
                user_id, date_of_birth, gender, blood_group, address, city, state,
                postal_code, country, phone, emergency_contact, allergies,
                chronic_diseases, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(input.date_of_birth)
        .bind(input.gender.as_str())
        .bind(input.blood_group.map(|g| g.as_str()))
        .bind(&input.address)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .bind(&input.emergency_contact)
        .bind(&input.allergies)
        .bind(&input.chronic_diseases)
        .bind(&input.notes)
        .fetch_one(pool)
        .await
    }

    /// 부분 업데이트
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: PatientPatch,
    ) -> Result<Option<PatientRecord>, sqlx::Error> {
        sqlx::query_as::<_, PatientRecord>(
            r#"
            UPDATE patients SET
                date_of_birth = COALESCE($2, date_of_birth),
                gender = COALESCE($3, gender),
                blood_group = COALESCE($4, blood_group),
                address = COALESCE($5, address),
                city = COALESCE($6, city),
                state = COALESCE($7, state),
                postal_code = COALESCE($8, postal_code),
                country = COALESCE($9, country),
                phone = COALESCE($10, phone),
                emergency_contact = COALESCE($11, emergency_contact),
                allergies = COALESCE($12, allergies),
                chronic_diseases = COALESCE($13, chronic_diseases),
                notes = COALESCE($14, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.date_of_birth)
        .bind(patch.gender.map(|g| g.as_str()))
        .bind(patch.blood_group.map(|g| g.as_str()))
        .bind(patch.address)
        .bind(patch.city)
        .bind(patch.state)
        .bind(patch.postal_code)
        .bind(patch.country)
        .bind(patch.phone)
        .bind(patch.emergency_contact)
        .bind(patch.allergies)
        .bind(patch.chronic_diseases)
        .bind(patch.notes)
        .fetch_optional(pool)
        .await
    }

    /// 환자 삭제
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
