//! Consultation Repository
//!
//! 진료 기록과 구조화된 처방(처방 + 처방 항목)을 관리합니다.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use homeo_core::ConsultationStatus;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;
use uuid::Uuid;

/// 기본 진료 시간 (분)
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// 진료 레코드
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// 의사 계정(users.id)
    pub doctor_id: Uuid,
    #[sqlx(default)]
    pub appointment_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    /// SCHEDULED | IN_PROGRESS | COMPLETED | CANCELLED | NO_SHOW
    pub status: String,
    pub complaints: String,
    #[sqlx(default)]
    pub diagnosis: Option<String>,
    /// 자유 형식 처방 메모
    #[sqlx(default)]
    pub prescription: Option<String>,
    #[sqlx(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 진료 + 환자/의사 이름
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationWithNames {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub consultation: ConsultationRecord,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
}

/// 처방 레코드
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRecord {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[sqlx(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 처방 항목 레코드
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionItemRecord {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_name: String,
    pub potency: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[sqlx(default)]
    pub notes: Option<String>,
}

/// 처방 + 항목
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionWithItems {
    #[serde(flatten)]
    pub prescription: PrescriptionRecord,
    pub items: Vec<PrescriptionItemRecord>,
}

/// 진료 상세 (처방 포함)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationDetail {
    #[serde(flatten)]
    pub consultation: ConsultationWithNames,
    pub prescriptions: Vec<PrescriptionWithItems>,
}

/// 목록 필터
#[derive(Debug, Clone, Default)]
pub struct ConsultationFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<ConsultationStatus>,
}

/// 새 진료 입력 (검증 완료)
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub complaints: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

/// 새 처방 항목 입력 (검증 완료)
#[derive(Debug, Clone)]
pub struct NewPrescriptionItem {
    pub medicine_name: String,
    pub potency: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub notes: Option<String>,
}

const SELECT_WITH_NAMES: &str = r#"
    SELECT c.*,
        pu.first_name AS patient_first_name, pu.last_name AS patient_last_name,
        d.first_name AS doctor_first_name, d.last_name AS doctor_last_name
    FROM consultations c
    JOIN patients p ON p.id = c.patient_id
    JOIN users pu ON pu.id = p.user_id
    JOIN users d ON d.id = c.doctor_id
"#;

/// Consultation Repository
pub struct ConsultationRepository;

impl ConsultationRepository {
    /// 진료 목록 (최신순)
    pub async fn list(
        pool: &PgPool,
        filter: ConsultationFilter,
    ) -> Result<Vec<ConsultationWithNames>, sqlx::Error> {
        sqlx::query_as::<_, ConsultationWithNames>(&format!(
            r#"{}
            WHERE ($1::uuid IS NULL OR c.patient_id = $1)
              AND ($2::uuid IS NULL OR c.doctor_id = $2)
              AND ($3::text IS NULL OR c.status = $3)
            ORDER BY c.scheduled_at DESC"#,
            SELECT_WITH_NAMES
        ))
        .bind(filter.patient_id)
        .bind(filter.doctor_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
    }

    /// 진료 조회
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ConsultationWithNames>, sqlx::Error> {
        let query = format!("{} WHERE c.id = $1", SELECT_WITH_NAMES);
        sqlx::query_as::<_, ConsultationWithNames>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 진료 상세 (처방 및 항목 포함)
    pub async fn find_detail(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<ConsultationDetail>, sqlx::Error> {
        let Some(consultation) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };
        let prescriptions = Self::prescriptions_for(pool, id).await?;

        Ok(Some(ConsultationDetail {
            consultation,
            prescriptions,
        }))
    }

    /// 진료 생성. 예정 시각은 현재, 소요 시간은 30분입니다.
    pub async fn create(
        pool: &PgPool,
        input: NewConsultation,
    ) -> Result<ConsultationRecord, sqlx::Error> {
        sqlx::query_as::<_, ConsultationRecord>(
            r#"
            INSERT INTO consultations (
                patient_id, doctor_id, appointment_id, scheduled_at, duration_minutes,
                status, complaints, diagnosis, prescription, notes
            )
            VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(input.patient_id)
        .bind(input.doctor_id)
        .bind(input.appointment_id)
        .bind(DEFAULT_DURATION_MINUTES)
        .bind(ConsultationStatus::Scheduled.as_str())
        .bind(&input.complaints)
        .bind(&input.diagnosis)
        .bind(&input.prescription)
        .bind(&input.notes)
        .fetch_one(pool)
        .await
    }

    /// 진단/메모/상태 업데이트
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        diagnosis: Option<String>,
        notes: Option<String>,
        status: Option<ConsultationStatus>,
    ) -> Result<Option<ConsultationRecord>, sqlx::Error> {
        sqlx::query_as::<_, ConsultationRecord>(
            r#"
            UPDATE consultations SET
                diagnosis = COALESCE($2, diagnosis),
                notes = COALESCE($3, notes),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(diagnosis)
        .bind(notes)
        .bind(status.map(|s| s.as_str()))
        .fetch_optional(pool)
        .await
    }

    /// 처방 생성 (처방 + 항목을 하나의 트랜잭션으로)
    pub async fn create_prescription(
        pool: &PgPool,
        consultation: &ConsultationRecord,
        notes: Option<String>,
        items: Vec<NewPrescriptionItem>,
    ) -> Result<PrescriptionWithItems, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let prescription = sqlx::query_as::<_, PrescriptionRecord>(
            r#"
            INSERT INTO prescriptions (consultation_id, patient_id, doctor_id, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(consultation.id)
        .bind(consultation.patient_id)
        .bind(consultation.doctor_id)
        .bind(&notes)
        .fetch_one(&mut *tx)
        .await?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let record = sqlx::query_as::<_, PrescriptionItemRecord>(
                r#"
                INSERT INTO prescription_items (
                    prescription_id, medicine_name, potency, dosage, frequency, duration, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(prescription.id)
            .bind(&item.medicine_name)
            .bind(&item.potency)
            .bind(&item.dosage)
            .bind(&item.frequency)
            .bind(&item.duration)
            .bind(&item.notes)
            .fetch_one(&mut *tx)
            .await?;
            records.push(record);
        }

        tx.commit().await?;

        Ok(PrescriptionWithItems {
            prescription,
            items: records,
        })
    }

    /// 진료의 처방 목록 (항목 포함, 생성순)
    pub async fn prescriptions_for(
        pool: &PgPool,
        consultation_id: Uuid,
    ) -> Result<Vec<PrescriptionWithItems>, sqlx::Error> {
        let prescriptions = sqlx::query_as::<_, PrescriptionRecord>(
            "SELECT * FROM prescriptions WHERE consultation_id = $1 ORDER BY created_at",
        )
        .bind(consultation_id)
        .fetch_all(pool)
        .await?;

        if prescriptions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = prescriptions.iter().map(|p| p.id).collect();
        let items = sqlx::query_as::<_, PrescriptionItemRecord>(
            "SELECT * FROM prescription_items \
             WHERE prescription_id = ANY($1) ORDER BY medicine_name",
        )
        .bind(&ids)
        .fetch_all(pool)
        .await?;

        Ok(group_items(prescriptions, items))
    }
}

/// 항목을 처방별로 묶습니다. 처방 순서는 유지됩니다.
fn group_items(
    prescriptions: Vec<PrescriptionRecord>,
    items: Vec<PrescriptionItemRecord>,
) -> Vec<PrescriptionWithItems> {
    let mut by_prescription: HashMap<Uuid, Vec<PrescriptionItemRecord>> = HashMap::new();
    for item in items {
        by_prescription
            .entry(item.prescription_id)
            .or_default()
            .push(item);
    }

    prescriptions
        .into_iter()
        .map(|prescription| PrescriptionWithItems {
            items: by_prescription.remove(&prescription.id).unwrap_or_default(),
            prescription,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prescription(id: Uuid) -> PrescriptionRecord {
        PrescriptionRecord {
            id,
            consultation_id: Uuid::nil(),
            patient_id: Uuid::nil(),
            doctor_id: Uuid::nil(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn item(prescription_id: Uuid, name: &str) -> PrescriptionItemRecord {
        PrescriptionItemRecord {
            id: Uuid::new_v4(),
            prescription_id,
            medicine_name: name.to_string(),
            potency: "30C".to_string(),
            dosage: "4 pills".to_string(),
            frequency: "TDS".to_string(),
            duration: "7 days".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_group_items_keeps_order_and_empty_prescriptions() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let grouped = group_items(
            vec![prescription(first), prescription(second)],
            vec![item(first, "Arnica"), item(first, "Belladonna")],
        );

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].prescription.id, first);
        assert_eq!(grouped[0].items.len(), 2);
        assert!(grouped[1].items.is_empty());
    }

    #[test]
    fn test_prescription_serializes_flat() {
        let id = Uuid::new_v4();
        let grouped = group_items(vec![prescription(id)], vec![item(id, "Arnica")]);
        let json = serde_json::to_value(&grouped[0]).unwrap();

        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["items"][0]["medicineName"], "Arnica");
        assert_eq!(json["items"][0]["potency"], "30C");
    }
}
