use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::appointment_slots::AppointmentSlotEntity;

/// Keyset position inside the available-slot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCursor {
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub id: Uuid,
}

impl From<&AppointmentSlotEntity> for SlotCursor {
    fn from(value: &AppointmentSlotEntity) -> Self {
        Self {
            slot_date: value.slot_date,
            start_time: value.start_time,
            id: value.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub center_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub after_date: Option<NaiveDate>,
    pub after_time: Option<NaiveTime>,
    pub after_id: Option<Uuid>,
    pub limit: Option<usize>,
}

impl AvailableSlotsQuery {
    pub fn cursor(&self) -> Option<SlotCursor> {
        Some(SlotCursor {
            slot_date: self.after_date?,
            start_time: self.after_time?,
            id: self.after_id?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotModel {
    pub center_id: Uuid,
    pub room_id: Option<Uuid>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotDto {
    pub id: Uuid,
    pub center_id: Uuid,
    pub room_id: Option<Uuid>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub current_bookings: i32,
    pub is_available: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentSlotEntity> for SlotDto {
    fn from(value: AppointmentSlotEntity) -> Self {
        Self {
            id: value.id,
            center_id: value.center_id,
            room_id: value.room_id,
            slot_date: value.slot_date,
            start_time: value.start_time,
            end_time: value.end_time,
            max_capacity: value.max_capacity,
            current_bookings: value.current_bookings,
            is_available: value.is_available,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotPageDto {
    pub slots: Vec<SlotDto>,
    pub next: Option<SlotCursor>,
}
