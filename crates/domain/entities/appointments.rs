use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::appointment_statuses::AppointmentStatus,
    infra::db::postgres::schema::appointments,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = appointments)]
pub struct AppointmentEntity {
    pub id: Uuid,
    pub booking_code: String,
    pub booked_by_user_id: Option<Uuid>,
    pub patient_kind: String,
    pub patient_user_id: Option<Uuid>,
    pub family_member_id: Option<Uuid>,
    pub guest_full_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_date_of_birth: Option<NaiveDate>,
    pub vaccine_id: Option<Uuid>,
    pub center_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub status: String,
    pub dose_number: i32,
    pub queue_number: Option<i32>,
    pub requires_consultation: bool,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentEntity {
    pub fn current_status(&self) -> Result<AppointmentStatus> {
        AppointmentStatus::from_str(&self.status).ok_or_else(|| {
            anyhow!(
                "appointment {} has unknown status {}",
                self.id,
                self.status
            )
        })
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        match (self.appointment_date, self.appointment_time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            (Some(date), None) => Some(date.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointments)]
pub struct InsertAppointmentEntity {
    pub id: Uuid,
    pub booking_code: String,
    pub booked_by_user_id: Option<Uuid>,
    pub patient_kind: String,
    pub patient_user_id: Option<Uuid>,
    pub family_member_id: Option<Uuid>,
    pub guest_full_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_date_of_birth: Option<NaiveDate>,
    pub vaccine_id: Option<Uuid>,
    pub center_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub status: String,
    pub dose_number: i32,
    pub requires_consultation: bool,
    pub notes: Option<String>,
}

/// Fields written together with a status change.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = appointments)]
pub struct AppointmentStatusChangeset {
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub queue_number: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written when an appointment moves to another slot.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = appointments)]
pub struct AppointmentSlotChangeset {
    pub status: String,
    pub center_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub updated_at: DateTime<Utc>,
}
