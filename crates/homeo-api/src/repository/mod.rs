//! Repository pattern for database operations.
//!
//! 데이터베이스 접근 로직을 라우트 핸들러에서 분리합니다.
//! 모든 Repository는 static methods 패턴을 사용하며, 열거형 컬럼은 문자열 태그로 저장됩니다.

pub mod appointments;
pub mod consultations;
pub mod patients;
pub mod users;

pub use appointments::{
    AppointmentRecord, AppointmentRepository, AppointmentWithNames, NewAppointment,
};
pub use consultations::{
    ConsultationDetail, ConsultationFilter, ConsultationRecord, ConsultationRepository,
    ConsultationWithNames, NewConsultation, NewPrescriptionItem, PrescriptionItemRecord,
    PrescriptionRecord, PrescriptionWithItems,
};
pub use patients::{
    PatientDetail, PatientInput, PatientPatch, PatientRecord, PatientRepository, PatientWithUser,
};
pub use users::{NewUser, UserRecord, UserRepository};

/// 유니크 제약 위반인지 확인합니다.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// 외래 키 제약 위반인지 확인합니다.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}
