use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::appointment_slots;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = appointment_slots)]
pub struct AppointmentSlotEntity {
    pub id: Uuid,
    pub center_id: Uuid,
    pub room_id: Option<Uuid>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub current_bookings: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentSlotEntity {
    pub fn has_capacity(&self) -> bool {
        self.is_available && self.current_bookings < self.max_capacity
    }

    /// The slot after one more booking, or `None` when it is full.
    pub fn reserved(&self) -> Option<Self> {
        if !self.has_capacity() {
            return None;
        }
        let current_bookings = self.current_bookings + 1;
        Some(Self {
            current_bookings,
            is_available: current_bookings < self.max_capacity,
            updated_at: Utc::now(),
            ..self.clone()
        })
    }

    /// The slot after one booking is given back. Never drops below zero.
    pub fn released(&self) -> Self {
        let current_bookings = (self.current_bookings - 1).max(0);
        Self {
            current_bookings,
            is_available: current_bookings < self.max_capacity,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.current_bookings >= 0
            && self.current_bookings <= self.max_capacity
            && self.is_available == (self.current_bookings < self.max_capacity)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.slot_date.and_time(self.start_time)
    }

    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.slot_date == date && self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = appointment_slots)]
pub struct InsertAppointmentSlotEntity {
    pub center_id: Uuid,
    pub room_id: Option<Uuid>,
    pub slot_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub current_bookings: i32,
    pub is_available: bool,
}
