//! Appointment Repository

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use homeo_core::AppointmentStatus;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

/// 예약 레코드
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// 의사 계정(users.id)
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    /// HH:mm
    pub appointment_time: String,
    /// PENDING | CONFIRMED | COMPLETED | CANCELLED | RESCHEDULED
    pub status: String,
    #[sqlx(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 예약 + 환자/의사 이름
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentWithNames {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub appointment: AppointmentRecord,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
}

/// 새 예약 입력 (검증 완료)
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub notes: Option<String>,
}

const SELECT_WITH_NAMES: &str = r#"
    SELECT a.*,
        pu.first_name AS patient_first_name, pu.last_name AS patient_last_name,
        d.first_name AS doctor_first_name, d.last_name AS doctor_last_name
    FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN users pu ON pu.id = p.user_id
    JOIN users d ON d.id = a.doctor_id
"#;

/// Appointment Repository
pub struct AppointmentRepository;

impl AppointmentRepository {
    /// 예약 목록 (날짜/시간 오름차순). 상태 필터 선택.
    pub async fn list(
        pool: &PgPool,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentWithNames>, sqlx::Error> {
        sqlx::query_as::<_, AppointmentWithNames>(&format!(
            "{} WHERE ($1::text IS NULL OR a.status = $1) \
             ORDER BY a.appointment_date, a.appointment_time",
            SELECT_WITH_NAMES
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
    }

    /// 예약 조회
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<AppointmentWithNames>, sqlx::Error> {
        sqlx::query_as::<_, AppointmentWithNames>(&format!("{} WHERE a.id = $1", SELECT_WITH_NAMES))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 예약 생성. 상태는 PENDING으로 시작합니다.
    pub async fn create(
        pool: &PgPool,
        input: NewAppointment,
    ) -> Result<AppointmentRecord, sqlx::Error> {
        sqlx::query_as::<_, AppointmentRecord>(
            r#"
            INSERT INTO appointments
                (patient_id, doctor_id, appointment_date, appointment_time, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(input.appointment_date)
        .bind(input.appointment_time.format("%H:%M").to_string())
        .bind(AppointmentStatus::Pending.as_str())
        .bind(&input.notes)
        .fetch_one(pool)
        .await
    }

    /// 상태/메모 업데이트
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        status: Option<AppointmentStatus>,
        notes: Option<String>,
    ) -> Result<Option<AppointmentRecord>, sqlx::Error> {
        sqlx::query_as::<_, AppointmentRecord>(
            r#"
            UPDATE appointments SET
                status = COALESCE($2, status),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.map(|s| s.as_str()))
        .bind(notes)
        .fetch_optional(pool)
        .await
    }

    /// 예약 취소 (삭제하지 않고 CANCELLED로 변경)
    pub async fn cancel(pool: &PgPool, id: Uuid) -> Result<Option<AppointmentRecord>, sqlx::Error> {
        Self::update(pool, id, Some(AppointmentStatus::Cancelled), None).await
    }
}
