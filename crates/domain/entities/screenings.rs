use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::screenings;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = screenings)]
pub struct ScreeningEntity {
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

/// Insert and update share one shape; the row is keyed by appointment.
#[derive(Debug, Clone, Insertable, AsChangeset, PartialEq)]
#[diesel(table_name = screenings)]
#[diesel(treat_none_as_null = true)]
pub struct UpsertScreeningEntity {
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
