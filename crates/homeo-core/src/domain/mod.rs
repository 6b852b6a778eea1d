//! 진료 도메인 열거형.
//!
//! 모든 열거형은 데이터베이스에 문자열 태그로 저장되며, `as_str`/`FromStr`로 변환합니다.

mod patient;
mod schedule;
mod user;

pub use patient::{BloodGroup, Gender};
pub use schedule::{AppointmentStatus, ConsultationStatus};
pub use user::UserStatus;
