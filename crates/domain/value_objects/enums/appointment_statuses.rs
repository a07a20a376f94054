use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    CheckedIn,
    Screening,
    Approved,
    Rejected,
    Injecting,
    Monitoring,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 11] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::Screening,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Injecting,
        AppointmentStatus::Monitoring,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::Screening => "SCREENING",
            AppointmentStatus::Approved => "APPROVED",
            AppointmentStatus::Rejected => "REJECTED",
            AppointmentStatus::Injecting => "INJECTING",
            AppointmentStatus::Monitoring => "MONITORING",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(AppointmentStatus::Pending),
            "CONFIRMED" => Some(AppointmentStatus::Confirmed),
            "CHECKED_IN" => Some(AppointmentStatus::CheckedIn),
            "SCREENING" => Some(AppointmentStatus::Screening),
            "APPROVED" => Some(AppointmentStatus::Approved),
            "REJECTED" => Some(AppointmentStatus::Rejected),
            "INJECTING" => Some(AppointmentStatus::Injecting),
            "MONITORING" => Some(AppointmentStatus::Monitoring),
            "COMPLETED" => Some(AppointmentStatus::Completed),
            "CANCELLED" => Some(AppointmentStatus::Cancelled),
            "RESCHEDULED" => Some(AppointmentStatus::Rescheduled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Clinical work has started; the booking can no longer be removed.
    pub fn is_clinical(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Injecting | AppointmentStatus::Monitoring | AppointmentStatus::Completed
        )
    }
}

impl Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
