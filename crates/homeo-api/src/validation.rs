//! 요청 필드 검증 함수.
//!
//! `validator`의 `custom(function = ...)`에서 사용합니다.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use homeo_core::{AppointmentStatus, BloodGroup, ConsultationStatus, Gender, HomeoError};
use regex::Regex;
use uuid::Uuid;
use validator::ValidationError;

use crate::auth::validate_password_strength;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// `YYYY-MM-DD` 날짜 파싱.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `HH:mm` 시각 파싱 (한 자리 시도 허용).
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    if value.len() > 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

pub fn parse_uuid(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

pub fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    parse_uuid(value)
        .map(|_| ())
        .ok_or_else(|| error("uuid", "Must be a valid UUID"))
}

pub fn validate_date(value: &str) -> Result<(), ValidationError> {
    parse_date(value)
        .map(|_| ())
        .ok_or_else(|| error("date_format", "Invalid date format (expected YYYY-MM-DD)"))
}

pub fn validate_time(value: &str) -> Result<(), ValidationError> {
    parse_time(value)
        .map(|_| ())
        .ok_or_else(|| error("time_format", "Time must be in HH:mm format"))
}

pub fn validate_password(value: &str) -> Result<(), ValidationError> {
    validate_password_strength(value).map_err(|message| error("password_strength", message))
}

fn validate_tag<T: FromStr>(
    value: &str,
    code: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    value.parse::<T>().map(|_| ()).map_err(|_| error(code, message))
}

pub fn validate_gender(value: &str) -> Result<(), ValidationError> {
    validate_tag::<Gender>(value, "gender", "Gender must be MALE, FEMALE or OTHER")
}

pub fn validate_blood_group(value: &str) -> Result<(), ValidationError> {
    validate_tag::<BloodGroup>(value, "blood_group", "Invalid blood group")
}

/// 예약 상태 파싱. 대소문자를 구분하지 않습니다.
pub fn parse_appointment_status(value: &str) -> Result<AppointmentStatus, HomeoError> {
    value.trim().to_uppercase().parse()
}

pub fn validate_appointment_status(value: &str) -> Result<(), ValidationError> {
    parse_appointment_status(value)
        .map(|_| ())
        .map_err(|_| error("appointment_status", "Invalid appointment status"))
}

pub fn validate_consultation_status(value: &str) -> Result<(), ValidationError> {
    validate_tag::<ConsultationStatus>(value, "consultation_status", "Invalid consultation status")
}

/// 우편번호: 숫자 5~6자리.
pub fn validate_postal_code(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if (5..=6).contains(&len) && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error("postal_code", "Invalid postal code"))
    }
}

/// `+(123) 456-7890` 형태: 선택적 `+`, 괄호로 감쌀 수 있는 두 숫자 그룹(1~4자리),
/// 마지막 숫자 그룹(1~9자리). 그룹 사이 구분자는 선택입니다.
static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+]?[(]?[0-9]{1,4}[)]?[-\s.]?[(]?[0-9]{1,4}[)]?[-\s.]?[0-9]{1,9}$")
        .expect("hardcoded phone regex is valid")
});

pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(error("phone", "Invalid phone number"))
    }
}
