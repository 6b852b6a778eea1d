//! # Homeo Core
//!
//! 클리닉 관리 백엔드의 공통 타입과 인프라를 제공합니다.
//!
//! - 설정 관리 (서버, 데이터베이스, 인증 시크릿)
//! - 로깅 인프라
//! - 공통 에러 타입
//! - 진료 도메인 열거형 (환자, 예약, 진료 상태)

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
