use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{
        appointment_histories::InsertAppointmentHistoryEntity,
        screenings::{ScreeningEntity, UpsertScreeningEntity},
    },
    value_objects::enums::screening_results::ScreeningResult,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub body_temperature: Option<f64>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreeningSubmission {
    pub appointment_id: Uuid,
    #[serde(flatten)]
    pub vitals: Vitals,
    /// Absent means APPROVED.
    pub result: Option<ScreeningResult>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    /// Lets the doctor switch the vaccine before injection.
    pub vaccine_id: Option<Uuid>,
}

/// Everything a screening decision writes: the screening row, an optional
/// vaccine switch, the appointment status and its history.
#[derive(Debug, Clone)]
pub struct ScreeningDecisionCommand {
    pub screening: UpsertScreeningEntity,
    pub expected_version: i32,
    pub switch_vaccine_to: Option<Uuid>,
    pub final_status: String,
    pub histories: Vec<InsertAppointmentHistoryEntity>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScreeningDto {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub body_temperature: Option<f64>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i32>,
    pub screening_result: String,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub screened_at: DateTime<Utc>,
}

impl From<ScreeningEntity> for ScreeningDto {
    fn from(value: ScreeningEntity) -> Self {
        Self {
            id: value.id,
            appointment_id: value.appointment_id,
            doctor_id: value.doctor_id,
            body_temperature: value.body_temperature,
            blood_pressure: value.blood_pressure,
            heart_rate: value.heart_rate,
            screening_result: value.screening_result,
            rejection_reason: value.rejection_reason,
            notes: value.notes,
            screened_at: value.screened_at,
        }
    }
}
