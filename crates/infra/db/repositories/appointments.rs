use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use diesel::{
    PgConnection, QueryResult, delete,
    dsl::max,
    insert_into,
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::{Integer, Text},
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            appointment_histories::{AppointmentHistoryEntity, InsertAppointmentHistoryEntity},
            appointments::{AppointmentEntity, InsertAppointmentEntity},
            payments::{InsertPaymentEntity, PaymentEntity},
        },
        repositories::appointments::{AppointmentRepository, BookingCodeTaken},
        value_objects::{
            appointments::{
                DeleteAppointmentCommand, DeleteAppointmentOutcome, QueueDay, SlotMoveCommand,
                StatusChangeCommand,
            },
            enums::{appointment_statuses::AppointmentStatus, payment_statuses::PaymentStatus},
            patients::{PATIENT_GUEST, Patient},
        },
    },
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{
                appointment_histories, appointments, payments, screenings, vaccination_records,
            },
        },
        repositories::appointment_slots::release_slot,
    },
};

const BOOKING_CODE_CONSTRAINT: &str = "appointments_booking_code_key";

pub struct AppointmentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AppointmentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Appointments belonging to the patient. Guests are matched on phone; a guest
/// without a phone matches nothing.
pub(crate) fn patient_appointments(patient: &Patient) -> Option<appointments::BoxedQuery<'static, Pg>> {
    let query = appointments::table.into_boxed();
    match patient {
        Patient::Registered { user_id } => {
            Some(query.filter(appointments::patient_user_id.eq(*user_id)))
        }
        Patient::FamilyMember { member_id } => {
            Some(query.filter(appointments::family_member_id.eq(*member_id)))
        }
        Patient::Guest(guest) => guest.phone.clone().map(|phone| {
            query
                .filter(appointments::patient_kind.eq(PATIENT_GUEST))
                .filter(appointments::guest_phone.eq(phone))
        }),
    }
}

/// Serializes queue number allocation for one center and day across concurrent check-ins.
fn lock_queue_day(conn: &mut PgConnection, queue: &QueueDay) -> QueryResult<()> {
    let center = queue.center_id.map(|id| id.to_string()).unwrap_or_default();
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1), $2)")
        .bind::<Text, _>(center)
        .bind::<Integer, _>(queue.date.num_days_from_ce())
        .execute(conn)?;
    Ok(())
}

fn next_queue_number(conn: &mut PgConnection, queue: &QueueDay) -> QueryResult<i32> {
    lock_queue_day(conn, queue)?;
    let mut query = appointments::table
        .filter(appointments::appointment_date.eq(queue.date))
        .select(max(appointments::queue_number))
        .into_boxed();
    query = match queue.center_id {
        Some(center_id) => query.filter(appointments::center_id.eq(center_id)),
        None => query.filter(appointments::center_id.is_null()),
    };
    let last = query.get_result::<Option<i32>>(conn)?;
    Ok(last.unwrap_or(0) + 1)
}

#[async_trait]
impl AppointmentRepository for AppointmentPostgres {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let appointment = appointments::table
            .find(appointment_id)
            .select(AppointmentEntity::as_select())
            .first::<AppointmentEntity>(&mut conn)
            .optional()?;

        Ok(appointment)
    }

    async fn find_by_booking_code(
        &self,
        booking_code: String,
    ) -> Result<Option<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let appointment = appointments::table
            .filter(appointments::booking_code.eq(booking_code))
            .select(AppointmentEntity::as_select())
            .first::<AppointmentEntity>(&mut conn)
            .optional()?;

        Ok(appointment)
    }

    async fn create(
        &self,
        appointment: InsertAppointmentEntity,
        payment: Option<InsertPaymentEntity>,
        history: InsertAppointmentHistoryEntity,
    ) -> Result<(AppointmentEntity, Option<PaymentEntity>)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let booking_code = appointment.booking_code.clone();

        let created = conn.transaction::<_, DieselError, _>(|tx| {
            let appointment = insert_into(appointments::table)
                .values(&appointment)
                .returning(AppointmentEntity::as_returning())
                .get_result::<AppointmentEntity>(tx)?;

            let payment = match payment {
                Some(payment) => Some(
                    insert_into(payments::table)
                        .values(&payment)
                        .returning(PaymentEntity::as_returning())
                        .get_result::<PaymentEntity>(tx)?,
                ),
                None => None,
            };

            insert_into(appointment_histories::table)
                .values(&history)
                .execute(tx)?;

            Ok((appointment, payment))
        });

        match created {
            Ok(created) => Ok(created),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info))
                if info.constraint_name() == Some(BOOKING_CODE_CONSTRAINT) =>
            {
                Err(BookingCodeTaken(booking_code).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn apply_status_change(
        &self,
        command: StatusChangeCommand,
    ) -> Result<Option<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = conn.transaction::<_, diesel::result::Error, _>(|tx| {
            let mut changes = command.changes;

            if let Some(queue) = &command.assign_queue_on {
                changes.queue_number = Some(next_queue_number(tx, queue)?);
            }

            let Some(appointment) = update(appointments::table)
                .filter(appointments::id.eq(command.appointment_id))
                .filter(appointments::version.eq(command.expected_version))
                .set((&changes, appointments::version.eq(appointments::version + 1)))
                .returning(AppointmentEntity::as_returning())
                .get_result::<AppointmentEntity>(tx)
                .optional()?
            else {
                return Ok(None);
            };

            if let Some(slot_id) = command.release_slot_id {
                release_slot(tx, slot_id)?;
            }

            if let Some(fee) = command.cancellation_fee {
                update(payments::table)
                    .filter(payments::appointment_id.eq(command.appointment_id))
                    .set((
                        payments::cancellation_fee.eq(Some(fee)),
                        payments::updated_at.eq(Utc::now()),
                    ))
                    .execute(tx)?;
            }

            insert_into(appointment_histories::table)
                .values(&command.history)
                .execute(tx)?;

            Ok(Some(appointment))
        })?;

        Ok(updated)
    }

    async fn move_to_slot(&self, command: SlotMoveCommand) -> Result<Option<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let moved = conn.transaction::<_, diesel::result::Error, _>(|tx| {
            let Some(appointment) = update(appointments::table)
                .filter(appointments::id.eq(command.appointment_id))
                .filter(appointments::version.eq(command.expected_version))
                .set((
                    &command.changes,
                    appointments::version.eq(appointments::version + 1),
                ))
                .returning(AppointmentEntity::as_returning())
                .get_result::<AppointmentEntity>(tx)
                .optional()?
            else {
                return Ok(None);
            };

            if let Some(slot_id) = command.release_slot_id {
                release_slot(tx, slot_id)?;
            }

            insert_into(appointment_histories::table)
                .values(&command.history)
                .execute(tx)?;

            Ok(Some(appointment))
        })?;

        Ok(moved)
    }

    async fn delete_cascade(
        &self,
        command: DeleteAppointmentCommand,
    ) -> Result<DeleteAppointmentOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let appointment_id = command.appointment_id;

        let outcome = conn.transaction::<_, diesel::result::Error, _>(|tx| {
            let Some(locked) = appointments::table
                .find(appointment_id)
                .select(AppointmentEntity::as_select())
                .for_update()
                .first::<AppointmentEntity>(tx)
                .optional()?
            else {
                return Ok(DeleteAppointmentOutcome::Missing);
            };
            if !command.removable_statuses.contains(&locked.status) {
                return Ok(DeleteAppointmentOutcome::StatusChanged(locked.status));
            }

            if command.keep_when_paid {
                let payment_status = payments::table
                    .filter(payments::appointment_id.eq(appointment_id))
                    .select(payments::payment_status)
                    .for_update()
                    .first::<String>(tx)
                    .optional()?;
                if payment_status.as_deref() == Some(PaymentStatus::Paid.as_str()) {
                    return Ok(DeleteAppointmentOutcome::PaymentSettled);
                }
            }

            if locked.status != AppointmentStatus::Cancelled.as_str() {
                if let Some(slot_id) = locked.slot_id {
                    release_slot(tx, slot_id)?;
                }
            }

            delete(payments::table.filter(payments::appointment_id.eq(appointment_id)))
                .execute(tx)?;
            delete(screenings::table.filter(screenings::appointment_id.eq(appointment_id)))
                .execute(tx)?;
            delete(
                vaccination_records::table
                    .filter(vaccination_records::appointment_id.eq(appointment_id)),
            )
            .execute(tx)?;
            delete(
                appointment_histories::table
                    .filter(appointment_histories::appointment_id.eq(appointment_id)),
            )
            .execute(tx)?;
            delete(appointments::table.find(appointment_id)).execute(tx)?;

            Ok(DeleteAppointmentOutcome::Deleted(locked))
        })?;

        Ok(outcome)
    }

    async fn list_history(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let history = appointment_histories::table
            .filter(appointment_histories::appointment_id.eq(appointment_id))
            .order(appointment_histories::changed_at.asc())
            .select(AppointmentHistoryEntity::as_select())
            .load::<AppointmentHistoryEntity>(&mut conn)?;

        Ok(history)
    }

    async fn count_active_on_date(&self, patient: Patient, date: NaiveDate) -> Result<i64> {
        let Some(query) = patient_appointments(&patient) else {
            return Ok(0);
        };
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let count = query
            .filter(appointments::appointment_date.eq(date))
            .filter(appointments::status.ne(AppointmentStatus::Cancelled.as_str()))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(count)
    }

    async fn max_booked_dose(
        &self,
        patient: Patient,
        vaccine_id: Uuid,
        statuses: Vec<String>,
    ) -> Result<i32> {
        let Some(query) = patient_appointments(&patient) else {
            return Ok(0);
        };
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let dose = query
            .filter(appointments::vaccine_id.eq(vaccine_id))
            .filter(appointments::status.eq_any(statuses))
            .select(max(appointments::dose_number))
            .get_result::<Option<i32>>(&mut conn)?;

        Ok(dose.unwrap_or(0))
    }

    async fn list_scheduled_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        statuses: Vec<String>,
    ) -> Result<Vec<AppointmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let candidates = appointments::table
            .filter(appointments::appointment_date.between(from.date(), to.date()))
            .filter(appointments::status.eq_any(statuses))
            .select(AppointmentEntity::as_select())
            .load::<AppointmentEntity>(&mut conn)?;

        Ok(candidates
            .into_iter()
            .filter(|appointment| {
                appointment
                    .scheduled_at()
                    .is_some_and(|at| at >= from && at < to)
            })
            .collect())
    }
}
