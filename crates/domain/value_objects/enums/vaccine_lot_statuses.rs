use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaccineLotStatus {
    Available,
    Expired,
    Depleted,
}

impl VaccineLotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaccineLotStatus::Available => "AVAILABLE",
            VaccineLotStatus::Expired => "EXPIRED",
            VaccineLotStatus::Depleted => "DEPLETED",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "AVAILABLE" => Some(VaccineLotStatus::Available),
            "EXPIRED" => Some(VaccineLotStatus::Expired),
            "DEPLETED" => Some(VaccineLotStatus::Depleted),
            _ => None,
        }
    }
}

impl Display for VaccineLotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
