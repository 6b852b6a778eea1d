use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HomeoError;

/// 예약 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = HomeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "RESCHEDULED" => Ok(AppointmentStatus::Rescheduled),
            other => Err(HomeoError::invalid("appointment status", other)),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 진료 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "SCHEDULED",
            ConsultationStatus::InProgress => "IN_PROGRESS",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::Cancelled => "CANCELLED",
            ConsultationStatus::NoShow => "NO_SHOW",
        }
    }
}

impl FromStr for ConsultationStatus {
    type Err = HomeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(ConsultationStatus::Scheduled),
            "IN_PROGRESS" => Ok(ConsultationStatus::InProgress),
            "COMPLETED" => Ok(ConsultationStatus::Completed),
            "CANCELLED" => Ok(ConsultationStatus::Cancelled),
            "NO_SHOW" => Ok(ConsultationStatus::NoShow),
            other => Err(HomeoError::invalid("consultation status", other)),
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_status_serde_matches_tag() {
        let json = serde_json::to_string(&AppointmentStatus::Cancelled).unwrap();
        assert_eq!(json, format!("\"{}\"", AppointmentStatus::Cancelled.as_str()));
    }

    #[test]
    fn test_consultation_status_multiword_tags() {
        assert_eq!(
            "IN_PROGRESS".parse::<ConsultationStatus>().unwrap(),
            ConsultationStatus::InProgress
        );
        assert_eq!(ConsultationStatus::NoShow.to_string(), "NO_SHOW");
        let json = serde_json::to_string(&ConsultationStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "DONE".parse::<AppointmentStatus>().unwrap_err();
        assert!(matches!(err, HomeoError::InvalidValue { .. }));
    }
}
