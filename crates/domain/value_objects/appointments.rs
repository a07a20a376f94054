use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{
        appointment_histories::{AppointmentHistoryEntity, InsertAppointmentHistoryEntity},
        appointments::{AppointmentEntity, AppointmentSlotChangeset, AppointmentStatusChangeset},
    },
    value_objects::{
        enums::{appointment_statuses::AppointmentStatus, payment_methods::PaymentMethod},
        patients::GuestPatient,
        payments::PaymentDto,
        screenings::ScreeningDto,
        vaccinations::VaccinationRecordDto,
    },
};

/// Status change applied with a version compare-and-swap.
#[derive(Debug, Clone)]
pub struct StatusChangeCommand {
    pub appointment_id: Uuid,
    pub expected_version: i32,
    pub changes: AppointmentStatusChangeset,
    /// Slot to give back in the same transaction.
    pub release_slot_id: Option<Uuid>,
    /// Draw the next queue number of that center and day in the same transaction.
    pub assign_queue_on: Option<QueueDay>,
    pub cancellation_fee: Option<i64>,
    pub history: InsertAppointmentHistoryEntity,
}

#[derive(Debug, Clone)]
pub struct SlotMoveCommand {
    pub appointment_id: Uuid,
    pub expected_version: i32,
    pub changes: AppointmentSlotChangeset,
    pub release_slot_id: Option<Uuid>,
    pub history: InsertAppointmentHistoryEntity,
}

/// Queue numbers restart per center and appointment day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDay {
    pub center_id: Option<Uuid>,
    pub date: NaiveDate,
}

/// Cascade delete whose guards are evaluated against the locked row.
#[derive(Debug, Clone)]
pub struct DeleteAppointmentCommand {
    pub appointment_id: Uuid,
    /// Statuses the locked appointment may be in.
    pub removable_statuses: Vec<String>,
    /// Keep the booking when its payment is already PAID.
    pub keep_when_paid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteAppointmentOutcome {
    /// The row as it was when locked, before removal.
    Deleted(AppointmentEntity),
    Missing,
    StatusChanged(String),
    PaymentSettled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentModel {
    /// Book for a family member instead of the signed-in account.
    pub family_member_id: Option<Uuid>,
    pub vaccine_id: Uuid,
    pub center_id: Uuid,
    pub slot_id: Uuid,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationRequestModel {
    pub vaccine_id: Option<Uuid>,
    pub family_member_id: Option<Uuid>,
    pub guest: Option<GuestPatient>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkInModel {
    pub guest: GuestPatient,
    pub vaccine_id: Uuid,
    pub center_id: Uuid,
    pub slot_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentModel {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceStatusModel {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleModel {
    pub slot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentDto {
    pub id: Uuid,
    pub booking_code: String,
    pub patient_kind: String,
    pub vaccine_id: Option<Uuid>,
    pub center_id: Option<Uuid>,
    pub slot_id: Option<Uuid>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub status: String,
    pub dose_number: i32,
    pub queue_number: Option<i32>,
    pub requires_consultation: bool,
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentEntity> for AppointmentDto {
    fn from(value: AppointmentEntity) -> Self {
        Self {
            id: value.id,
            booking_code: value.booking_code,
            patient_kind: value.patient_kind,
            vaccine_id: value.vaccine_id,
            center_id: value.center_id,
            slot_id: value.slot_id,
            appointment_date: value.appointment_date,
            appointment_time: value.appointment_time,
            status: value.status,
            dose_number: value.dose_number,
            queue_number: value.queue_number,
            requires_consultation: value.requires_consultation,
            cancellation_reason: value.cancellation_reason,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentHistoryDto {
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub changed_by_role: String,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl From<AppointmentHistoryEntity> for AppointmentHistoryDto {
    fn from(value: AppointmentHistoryEntity) -> Self {
        Self {
            old_status: value.old_status,
            new_status: value.new_status,
            changed_by: value.changed_by,
            changed_by_role: value.changed_by_role,
            reason: value.reason,
            changed_at: value.changed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingDto {
    pub appointment: AppointmentDto,
    pub payment: Option<PaymentDto>,
    pub payment_url: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionDto {
    pub appointment: AppointmentDto,
    pub changed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationDto {
    pub appointment: AppointmentDto,
    pub changed: bool,
    pub cancellation_fee: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentTraceDto {
    pub appointment: AppointmentDto,
    pub payment: Option<PaymentDto>,
    pub screening: Option<ScreeningDto>,
    pub vaccination_record: Option<VaccinationRecordDto>,
    pub history: Vec<AppointmentHistoryDto>,
}
