use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::appointment_statuses::AppointmentStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningResult {
    #[default]
    Approved,
    Rejected,
}

impl ScreeningResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreeningResult::Approved => "APPROVED",
            ScreeningResult::Rejected => "REJECTED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "APPROVED" => Some(ScreeningResult::Approved),
            "REJECTED" => Some(ScreeningResult::Rejected),
            _ => None,
        }
    }

    pub fn target_status(&self) -> AppointmentStatus {
        match self {
            ScreeningResult::Approved => AppointmentStatus::Approved,
            ScreeningResult::Rejected => AppointmentStatus::Rejected,
        }
    }
}

impl Display for ScreeningResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
