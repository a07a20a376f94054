use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::{
        appointment_histories::{AppointmentHistoryEntity, InsertAppointmentHistoryEntity},
        appointments::{AppointmentEntity, InsertAppointmentEntity},
        payments::{InsertPaymentEntity, PaymentEntity},
    },
    value_objects::{
        appointments::{
            DeleteAppointmentCommand, DeleteAppointmentOutcome, SlotMoveCommand,
            StatusChangeCommand,
        },
        patients::Patient,
    },
};

/// Raised by [`AppointmentRepository::create`] when the booking code is already in use.
#[derive(Debug, Error)]
#[error("booking code {0} is already taken")]
pub struct BookingCodeTaken(pub String);

#[async_trait]
#[automock]
pub trait AppointmentRepository {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>>;

    async fn find_by_booking_code(&self, booking_code: String)
    -> Result<Option<AppointmentEntity>>;

    /// Inserts the appointment, its payment and the creation history entry in one transaction.
    /// A booking code collision fails with [`BookingCodeTaken`].
    async fn create(
        &self,
        appointment: InsertAppointmentEntity,
        payment: Option<InsertPaymentEntity>,
        history: InsertAppointmentHistoryEntity,
    ) -> Result<(AppointmentEntity, Option<PaymentEntity>)>;

    /// Returns `None` when `expected_version` no longer matches.
    async fn apply_status_change(
        &self,
        command: StatusChangeCommand,
    ) -> Result<Option<AppointmentEntity>>;

    /// Returns `None` when `expected_version` no longer matches.
    async fn move_to_slot(&self, command: SlotMoveCommand) -> Result<Option<AppointmentEntity>>;

    /// Locks the appointment, re-checks the command's guards against the locked
    /// row, gives back its seat unless already CANCELLED, then removes payment,
    /// screening, record, history and the appointment itself.
    async fn delete_cascade(
        &self,
        command: DeleteAppointmentCommand,
    ) -> Result<DeleteAppointmentOutcome>;

    async fn list_history(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryEntity>>;

    /// Live (not cancelled) appointments of the patient on that date.
    async fn count_active_on_date(&self, patient: Patient, date: NaiveDate) -> Result<i64>;

    /// Highest dose number among the patient's appointments in `statuses`, 0 if none.
    async fn max_booked_dose(
        &self,
        patient: Patient,
        vaccine_id: Uuid,
        statuses: Vec<String>,
    ) -> Result<i32>;

    async fn list_scheduled_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        statuses: Vec<String>,
    ) -> Result<Vec<AppointmentEntity>>;
}
