use std::sync::Arc;

use chrono::{Local, Utc};
use crates::{
    domain::{
        entities::{
            appointment_histories::{AppointmentHistoryEntity, InsertAppointmentHistoryEntity},
            appointments::{AppointmentEntity, AppointmentSlotChangeset, InsertAppointmentEntity},
            payments::{InsertPaymentEntity, PaymentEntity},
            screenings::ScreeningEntity,
            vaccination_records::VaccinationRecordEntity,
            vaccines::VaccineEntity,
        },
        repositories::{
            appointments::{AppointmentRepository, BookingCodeTaken},
            family_members::FamilyMemberRepository,
            screenings::ScreeningRepository, vaccination_records::VaccinationRecordRepository,
            vaccines::VaccineRepository,
        },
        value_objects::{
            actors::ActorContext,
            appointments::{
                BookAppointmentModel, ConsultationRequestModel, DeleteAppointmentCommand,
                DeleteAppointmentOutcome, QueueDay, SlotMoveCommand, WalkInModel,
            },
            enums::{
                appointment_statuses::AppointmentStatus, payment_methods::PaymentMethod,
                payment_statuses::PaymentStatus, roles::Role,
            },
            patients::{GuestPatient, Patient},
        },
    },
    notifications::{AppointmentEventKind, AppointmentNotifier},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    appointment_state_machine::{
        AppointmentStateMachine, TransitionOptions, TransitionOutcome, appointment_event,
        authorize_edge, ensure_access, history_entry,
    },
    codes,
    errors::{BookingError, UseCaseResult, storage_failure},
    payment_reconciler::{PaymentReconciler, cancellation_fee},
    slot_ledger::SlotLedger,
};

/// Statuses whose dose counts as already taken when numbering the next dose.
const IN_FLIGHT_STATUSES: [AppointmentStatus; 8] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Confirmed,
    AppointmentStatus::Rescheduled,
    AppointmentStatus::CheckedIn,
    AppointmentStatus::Screening,
    AppointmentStatus::Approved,
    AppointmentStatus::Injecting,
    AppointmentStatus::Monitoring,
];

const CUSTOMER_CANCEL_NOTICE_HOURS: i64 = 24;

const BOOKING_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct BookingResult {
    pub appointment: AppointmentEntity,
    pub payment: Option<PaymentEntity>,
    pub payment_url: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CancellationResult {
    pub appointment: AppointmentEntity,
    pub changed: bool,
    pub cancellation_fee: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AppointmentTrace {
    pub appointment: AppointmentEntity,
    pub payment: Option<PaymentEntity>,
    pub screening: Option<ScreeningEntity>,
    pub vaccination_record: Option<VaccinationRecordEntity>,
    pub history: Vec<AppointmentHistoryEntity>,
}

fn draft_appointment(
    patient: &Patient,
    booked_by_user_id: Option<Uuid>,
    status: AppointmentStatus,
    dose_number: i32,
    notes: Option<String>,
) -> InsertAppointmentEntity {
    let columns = patient.columns();
    InsertAppointmentEntity {
        id: Uuid::new_v4(),
        booking_code: codes::booking_code(Local::now()),
        booked_by_user_id,
        patient_kind: columns.patient_kind,
        patient_user_id: columns.patient_user_id,
        family_member_id: columns.family_member_id,
        guest_full_name: columns.guest_full_name,
        guest_email: columns.guest_email,
        guest_phone: columns.guest_phone,
        guest_date_of_birth: columns.guest_date_of_birth,
        vaccine_id: None,
        center_id: None,
        slot_id: None,
        room_id: None,
        appointment_date: None,
        appointment_time: None,
        status: status.as_str().to_string(),
        dose_number,
        requires_consultation: false,
        notes,
    }
}

fn validate_guest(guest: &GuestPatient) -> UseCaseResult<()> {
    if guest.full_name.trim().is_empty() {
        return Err(BookingError::Validation(
            "guest full_name is required".to_string(),
        ));
    }
    Ok(())
}

pub struct BookingOrchestrator {
    appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
    vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
    family_member_repository: Arc<dyn FamilyMemberRepository + Send + Sync>,
    screening_repository: Arc<dyn ScreeningRepository + Send + Sync>,
    record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
    slot_ledger: Arc<SlotLedger>,
    state_machine: Arc<AppointmentStateMachine>,
    reconciler: Arc<PaymentReconciler>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl BookingOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
        vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
        family_member_repository: Arc<dyn FamilyMemberRepository + Send + Sync>,
        screening_repository: Arc<dyn ScreeningRepository + Send + Sync>,
        record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
        slot_ledger: Arc<SlotLedger>,
        state_machine: Arc<AppointmentStateMachine>,
        reconciler: Arc<PaymentReconciler>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            appointment_repository,
            vaccine_repository,
            family_member_repository,
            screening_repository,
            record_repository,
            slot_ledger,
            state_machine,
            reconciler,
            notifier,
        }
    }

    async fn load_vaccine(&self, vaccine_id: Uuid) -> UseCaseResult<VaccineEntity> {
        self.vaccine_repository
            .find_by_id(vaccine_id)
            .await
            .map_err(storage_failure("booking: load vaccine"))?
            .ok_or(BookingError::NotFound("vaccine"))
    }

    /// The family member when given, else the signed-in account itself.
    async fn resolve_patient(
        &self,
        booked_by: Uuid,
        family_member_id: Option<Uuid>,
    ) -> UseCaseResult<Patient> {
        let Some(member_id) = family_member_id else {
            return Ok(Patient::Registered { user_id: booked_by });
        };

        let member = self
            .family_member_repository
            .find_by_id(member_id)
            .await
            .map_err(storage_failure("booking: load family member"))?
            .ok_or(BookingError::NotFound("family member"))?;
        if member.owner_user_id != booked_by {
            return Err(BookingError::Forbidden(
                "family member belongs to another account".to_string(),
            ));
        }
        Ok(Patient::FamilyMember { member_id })
    }

    async fn next_dose_number(
        &self,
        patient: &Patient,
        vaccine: &VaccineEntity,
    ) -> UseCaseResult<i32> {
        let completed = self
            .record_repository
            .max_completed_dose(patient.clone(), vaccine.id)
            .await
            .map_err(storage_failure("booking: load completed doses"))?;
        let booked = self
            .appointment_repository
            .max_booked_dose(
                patient.clone(),
                vaccine.id,
                IN_FLIGHT_STATUSES
                    .iter()
                    .map(|status| status.as_str().to_string())
                    .collect(),
            )
            .await
            .map_err(storage_failure("booking: load booked doses"))?;

        let next = completed.max(booked) + 1;
        if next > vaccine.doses_required {
            return Err(BookingError::Validation(format!(
                "all {} doses of {} are already given or booked",
                vaccine.doses_required, vaccine.name
            )));
        }
        Ok(next)
    }

    /// Inserts the booking, drawing a fresh booking code when the generated one
    /// is taken. Gives the reserved seat back when the insert fails.
    async fn persist(
        &self,
        mut appointment: InsertAppointmentEntity,
        payment: Option<InsertPaymentEntity>,
        history: InsertAppointmentHistoryEntity,
        reserved_slot_id: Option<Uuid>,
    ) -> UseCaseResult<(AppointmentEntity, Option<PaymentEntity>)> {
        let mut attempt = 1;
        let err = loop {
            match self
                .appointment_repository
                .create(appointment.clone(), payment.clone(), history.clone())
                .await
            {
                Ok(created) => return Ok(created),
                Err(err) if err.is::<BookingCodeTaken>() && attempt < BOOKING_CODE_ATTEMPTS => {
                    warn!(
                        booking_code = %appointment.booking_code,
                        attempt,
                        "booking: booking code taken, drawing another"
                    );
                    appointment.booking_code = codes::booking_code(Local::now());
                    attempt += 1;
                }
                Err(err) => break err,
            }
        };

        error!(db_error = ?err, "booking: failed to insert appointment");
        if let Some(slot_id) = reserved_slot_id {
            if let Err(release_err) = self.slot_ledger.release(slot_id).await {
                error!(
                    %slot_id,
                    error = %release_err,
                    "booking: failed to give back seat after failed insert"
                );
            }
        }
        Err(BookingError::Internal(err))
    }

    pub async fn book_appointment(
        &self,
        actor: &ActorContext,
        model: BookAppointmentModel,
        client_ip: &str,
    ) -> UseCaseResult<BookingResult> {
        let booked_by = actor.actor_id.ok_or_else(|| {
            BookingError::Forbidden("booking requires a signed-in account".to_string())
        })?;
        let patient = self.resolve_patient(booked_by, model.family_member_id).await?;
        let vaccine = self.load_vaccine(model.vaccine_id).await?;

        let slot = self.slot_ledger.find_slot(model.slot_id).await?;
        if slot.center_id != model.center_id {
            return Err(BookingError::Validation(
                "slot does not belong to the selected center".to_string(),
            ));
        }
        if slot.starts_at() <= Local::now().naive_local() {
            return Err(BookingError::Validation("slot has already started".to_string()));
        }
        if !slot.has_capacity() {
            return Err(BookingError::SlotFull(slot.id));
        }

        let dose_number = self.next_dose_number(&patient, &vaccine).await?;

        let mut warnings = Vec::new();
        let same_day = self
            .appointment_repository
            .count_active_on_date(patient.clone(), slot.slot_date)
            .await
            .map_err(storage_failure("booking: count same-day appointments"))?;
        if same_day > 0 {
            warnings.push(format!(
                "patient already has an appointment on {}",
                slot.slot_date
            ));
        }

        let method = model.payment_method.unwrap_or_default();
        let amount = PaymentReconciler::quote(&vaccine);
        let status = if method.is_gateway() && amount.is_some() {
            AppointmentStatus::Pending
        } else {
            AppointmentStatus::Confirmed
        };

        let appointment = InsertAppointmentEntity {
            vaccine_id: Some(vaccine.id),
            center_id: Some(slot.center_id),
            slot_id: Some(slot.id),
            room_id: slot.room_id,
            appointment_date: Some(slot.slot_date),
            appointment_time: Some(slot.start_time),
            ..draft_appointment(&patient, Some(booked_by), status, dose_number, model.notes)
        };
        let payment = amount.map(|amount| PaymentReconciler::new_payment(appointment.id, amount, method));
        let history = history_entry(
            appointment.id,
            None,
            status,
            actor,
            Some("Appointment booked".to_string()),
        );

        self.slot_ledger.reserve(slot.id).await?;
        let (appointment, payment) = self
            .persist(appointment, payment, history, Some(slot.id))
            .await?;

        info!(
            appointment_id = %appointment.id,
            booking_code = %appointment.booking_code,
            slot_id = %slot.id,
            status = %status,
            "booking: appointment booked"
        );
        self.notifier.publish(appointment_event(
            AppointmentEventKind::Created,
            &appointment,
            None,
        ));

        let payment_url = match &payment {
            Some(payment) if method.is_gateway() => {
                match self.reconciler.payment_url_for(&appointment, payment, client_ip) {
                    Ok(url) => Some(url),
                    Err(err) => {
                        warn!(
                            appointment_id = %appointment.id,
                            error = %err,
                            "booking: payment url unavailable, client may request it again"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(BookingResult {
            appointment,
            payment,
            payment_url,
            warnings,
        })
    }

    /// A PENDING request without slot for staff to follow up on. Guests may ask too.
    pub async fn request_consultation(
        &self,
        actor: Option<&ActorContext>,
        model: ConsultationRequestModel,
    ) -> UseCaseResult<AppointmentEntity> {
        let booked_by = actor.and_then(|actor| actor.actor_id);
        let patient = match (model.guest, booked_by) {
            (Some(guest), _) => {
                validate_guest(&guest)?;
                Patient::Guest(guest)
            }
            (None, Some(user_id)) => self.resolve_patient(user_id, model.family_member_id).await?,
            (None, None) => {
                return Err(BookingError::Validation(
                    "guest details are required without an account".to_string(),
                ));
            }
        };

        if let Some(vaccine_id) = model.vaccine_id {
            self.load_vaccine(vaccine_id).await?;
        }

        let requester = actor.copied().unwrap_or(ActorContext {
            actor_id: None,
            role: Role::Customer,
            center_id: None,
        });
        let appointment = InsertAppointmentEntity {
            vaccine_id: model.vaccine_id,
            requires_consultation: true,
            ..draft_appointment(&patient, booked_by, AppointmentStatus::Pending, 1, model.notes)
        };
        let history = history_entry(
            appointment.id,
            None,
            AppointmentStatus::Pending,
            &requester,
            Some("Consultation requested".to_string()),
        );

        let (appointment, _) = self.persist(appointment, None, history, None).await?;
        info!(
            appointment_id = %appointment.id,
            patient_kind = %appointment.patient_kind,
            "booking: consultation requested"
        );
        self.notifier.publish(appointment_event(
            AppointmentEventKind::Created,
            &appointment,
            None,
        ));
        Ok(appointment)
    }

    pub async fn create_walk_in(
        &self,
        actor: &ActorContext,
        model: WalkInModel,
    ) -> UseCaseResult<BookingResult> {
        if !matches!(actor.role, Role::Receptionist | Role::Admin) {
            return Err(BookingError::Forbidden(
                "only reception registers walk-ins".to_string(),
            ));
        }
        if !actor.works_at(Some(model.center_id)) {
            return Err(BookingError::CenterMismatch);
        }
        validate_guest(&model.guest)?;
        let vaccine = self.load_vaccine(model.vaccine_id).await?;
        let patient = Patient::Guest(model.guest);

        let slot = match model.slot_id {
            Some(slot_id) => {
                let slot = self.slot_ledger.find_slot(slot_id).await?;
                if slot.center_id != model.center_id {
                    return Err(BookingError::Validation(
                        "slot does not belong to the selected center".to_string(),
                    ));
                }
                if model
                    .appointment_date
                    .is_some_and(|date| date != slot.slot_date)
                {
                    return Err(BookingError::Validation(
                        "slot is on a different date".to_string(),
                    ));
                }
                Some(slot)
            }
            None => None,
        };

        let dose_number = self.next_dose_number(&patient, &vaccine).await?;
        let today = Local::now().date_naive();
        let (date, time, room_id) = match &slot {
            Some(slot) => (slot.slot_date, Some(slot.start_time), slot.room_id),
            None => (
                model.appointment_date.unwrap_or(today),
                model.appointment_time,
                None,
            ),
        };

        let appointment = InsertAppointmentEntity {
            vaccine_id: Some(vaccine.id),
            center_id: Some(model.center_id),
            slot_id: slot.as_ref().map(|slot| slot.id),
            room_id,
            appointment_date: Some(date),
            appointment_time: time,
            ..draft_appointment(
                &patient,
                None,
                AppointmentStatus::Confirmed,
                dose_number,
                model.notes,
            )
        };
        let payment = PaymentReconciler::quote(&vaccine)
            .map(|amount| PaymentReconciler::new_payment(appointment.id, amount, PaymentMethod::Cash));
        let history = history_entry(
            appointment.id,
            None,
            AppointmentStatus::Confirmed,
            actor,
            Some("Walk-in registered".to_string()),
        );

        let reserved = match &slot {
            Some(slot) => Some(self.slot_ledger.reserve(slot.id).await?.id),
            None => None,
        };
        let (appointment, payment) = self.persist(appointment, payment, history, reserved).await?;

        info!(
            appointment_id = %appointment.id,
            booking_code = %appointment.booking_code,
            "booking: walk-in registered"
        );
        self.notifier.publish(appointment_event(
            AppointmentEventKind::Created,
            &appointment,
            None,
        ));

        Ok(BookingResult {
            appointment,
            payment,
            payment_url: None,
            warnings: Vec::new(),
        })
    }

    pub async fn cancel_appointment(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> UseCaseResult<CancellationResult> {
        let appointment = self.state_machine.load(appointment_id).await?;
        ensure_access(actor, &appointment)?;

        let current = appointment.current_status()?;
        if current == AppointmentStatus::Cancelled {
            info!(%appointment_id, "booking: appointment already cancelled");
            return Ok(CancellationResult {
                appointment,
                changed: false,
                cancellation_fee: None,
            });
        }
        authorize_edge(current, AppointmentStatus::Cancelled, actor)?;

        let now = Local::now().naive_local();
        let hours_before = appointment
            .scheduled_at()
            .map(|at| (at - now).num_hours());

        if actor.role == Role::Customer
            && current == AppointmentStatus::Confirmed
            && hours_before.is_some_and(|hours| hours < CUSTOMER_CANCEL_NOTICE_HOURS)
        {
            return Err(BookingError::Validation(format!(
                "confirmed appointments can only be cancelled at least {CUSTOMER_CANCEL_NOTICE_HOURS} hours in advance"
            )));
        }

        let fee = match self.reconciler.payment_for(appointment_id).await? {
            Some(payment) if payment.status()? == PaymentStatus::Paid => Some(cancellation_fee(
                payment.amount,
                hours_before.unwrap_or(CUSTOMER_CANCEL_NOTICE_HOURS),
            )),
            _ => None,
        };

        let outcome = self
            .state_machine
            .transition(
                &appointment,
                AppointmentStatus::Cancelled,
                actor,
                TransitionOptions {
                    reason: Some(reason.unwrap_or_else(|| "Cancelled".to_string())),
                    cancellation_fee: fee,
                    assign_queue_on: None,
                },
            )
            .await?;

        Ok(CancellationResult {
            appointment: outcome.appointment,
            changed: outcome.changed,
            cancellation_fee: fee.filter(|_| outcome.changed),
        })
    }

    /// General transition entry point for staff and admins.
    pub async fn advance_status(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
        to: AppointmentStatus,
        reason: Option<String>,
    ) -> UseCaseResult<TransitionOutcome> {
        if to == AppointmentStatus::Cancelled {
            let previous = self.state_machine.load(appointment_id).await?.current_status()?;
            let cancelled = self.cancel_appointment(actor, appointment_id, reason).await?;
            return Ok(TransitionOutcome {
                appointment: cancelled.appointment,
                previous,
                changed: cancelled.changed,
                warnings: Vec::new(),
            });
        }
        if to == AppointmentStatus::Rescheduled {
            return Err(BookingError::Validation(
                "use the reschedule operation to move an appointment".to_string(),
            ));
        }

        let appointment = self.state_machine.load(appointment_id).await?;
        ensure_access(actor, &appointment)?;

        let mut options = TransitionOptions {
            reason,
            ..Default::default()
        };
        if to == AppointmentStatus::CheckedIn
            && appointment.current_status()? != AppointmentStatus::CheckedIn
        {
            let today = Local::now().date_naive();
            if !actor.is_admin() && appointment.appointment_date != Some(today) {
                return Err(BookingError::Validation(
                    "only today's appointments can be checked in".to_string(),
                ));
            }
            options.assign_queue_on = Some(QueueDay {
                center_id: appointment.center_id,
                date: appointment.appointment_date.unwrap_or(today),
            });
        }

        self.state_machine
            .transition(&appointment, to, actor, options)
            .await
    }

    pub async fn reschedule(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
        new_slot_id: Uuid,
    ) -> UseCaseResult<AppointmentEntity> {
        let appointment = self.state_machine.load(appointment_id).await?;
        ensure_access(actor, &appointment)?;

        let current = appointment.current_status()?;
        if !matches!(
            current,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::Rescheduled
        ) {
            return Err(BookingError::InvalidTransition {
                from: current,
                to: AppointmentStatus::Rescheduled,
                role: actor.role,
            });
        }
        let target = if appointment.slot_id.is_some() {
            AppointmentStatus::Rescheduled
        } else {
            current
        };
        authorize_edge(current, target, actor)?;

        if appointment.slot_id == Some(new_slot_id) {
            return Err(BookingError::Validation(
                "appointment is already in this slot".to_string(),
            ));
        }
        let slot = self.slot_ledger.find_slot(new_slot_id).await?;
        if !actor.works_at(Some(slot.center_id)) {
            return Err(BookingError::CenterMismatch);
        }
        if slot.starts_at() <= Local::now().naive_local() {
            return Err(BookingError::Validation("slot has already started".to_string()));
        }

        self.slot_ledger.reserve(slot.id).await?;

        let command = SlotMoveCommand {
            appointment_id,
            expected_version: appointment.version,
            changes: AppointmentSlotChangeset {
                status: target.as_str().to_string(),
                center_id: Some(slot.center_id),
                slot_id: Some(slot.id),
                room_id: slot.room_id,
                appointment_date: Some(slot.slot_date),
                appointment_time: Some(slot.start_time),
                updated_at: Utc::now(),
            },
            release_slot_id: appointment.slot_id,
            history: history_entry(
                appointment_id,
                Some(current),
                target,
                actor,
                Some(format!(
                    "Moved to {} {}",
                    slot.slot_date,
                    slot.start_time.format("%H:%M")
                )),
            ),
        };

        let moved = match self.appointment_repository.move_to_slot(command).await {
            Ok(Some(moved)) => moved,
            Ok(None) => {
                self.give_back(slot.id).await;
                return Err(BookingError::Conflict(appointment_id));
            }
            Err(err) => {
                error!(%appointment_id, db_error = ?err, "booking: failed to move appointment");
                self.give_back(slot.id).await;
                return Err(BookingError::Internal(err));
            }
        };

        info!(
            %appointment_id,
            from_slot = ?appointment.slot_id,
            to_slot = %slot.id,
            "booking: appointment rescheduled"
        );
        self.notifier.publish(appointment_event(
            AppointmentEventKind::StatusChanged,
            &moved,
            Some("Appointment rescheduled".to_string()),
        ));
        Ok(moved)
    }

    async fn give_back(&self, slot_id: Uuid) {
        if let Err(err) = self.slot_ledger.release(slot_id).await {
            error!(%slot_id, error = %err, "booking: failed to give back reserved seat");
        }
    }

    pub async fn delete_appointment(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<()> {
        if !actor.is_admin() {
            return Err(BookingError::Forbidden(
                "only admins delete appointments".to_string(),
            ));
        }
        let appointment = self.state_machine.load(appointment_id).await?;
        let status = appointment.current_status()?;
        if status.is_clinical() {
            return Err(BookingError::Validation(format!(
                "appointments in {status} cannot be deleted"
            )));
        }

        let outcome = self
            .appointment_repository
            .delete_cascade(DeleteAppointmentCommand {
                appointment_id,
                removable_statuses: AppointmentStatus::ALL
                    .iter()
                    .filter(|status| !status.is_clinical())
                    .map(|status| status.as_str().to_string())
                    .collect(),
                keep_when_paid: false,
            })
            .await
            .map_err(storage_failure("booking: delete appointment"))?;
        match outcome {
            DeleteAppointmentOutcome::Deleted(_) => {}
            DeleteAppointmentOutcome::Missing => return Err(BookingError::NotFound("appointment")),
            DeleteAppointmentOutcome::StatusChanged(_) | DeleteAppointmentOutcome::PaymentSettled => {
                return Err(BookingError::Conflict(appointment_id));
            }
        }

        info!(%appointment_id, "booking: appointment deleted by admin");
        Ok(())
    }

    pub async fn trace(
        &self,
        actor: &ActorContext,
        booking_code: &str,
    ) -> UseCaseResult<AppointmentTrace> {
        let appointment = self
            .appointment_repository
            .find_by_booking_code(booking_code.trim().to_string())
            .await
            .map_err(storage_failure("booking: load appointment by code"))?
            .ok_or(BookingError::NotFound("appointment"))?;
        self.assemble_trace(actor, appointment).await
    }

    pub async fn trace_by_id(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<AppointmentTrace> {
        let appointment = self.state_machine.load(appointment_id).await?;
        self.assemble_trace(actor, appointment).await
    }

    async fn assemble_trace(
        &self,
        actor: &ActorContext,
        appointment: AppointmentEntity,
    ) -> UseCaseResult<AppointmentTrace> {
        ensure_access(actor, &appointment)?;

        let payment = self.reconciler.payment_for(appointment.id).await?;
        let screening = self
            .screening_repository
            .find_by_appointment_id(appointment.id)
            .await
            .map_err(storage_failure("booking: load screening"))?;
        let vaccination_record = self
            .record_repository
            .find_by_appointment_id(appointment.id)
            .await
            .map_err(storage_failure("booking: load vaccination record"))?;
        let history = self
            .appointment_repository
            .list_history(appointment.id)
            .await
            .map_err(storage_failure("booking: load history"))?;

        Ok(AppointmentTrace {
            appointment,
            payment,
            screening,
            vaccination_record,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::Harness;
    use tokio::sync::Barrier;

    fn customer() -> ActorContext {
        ActorContext::new(Uuid::new_v4(), Role::Customer, None)
    }

    fn booking(vaccine_id: Uuid, slot_center: Uuid, slot_id: Uuid) -> BookAppointmentModel {
        BookAppointmentModel {
            family_member_id: None,
            vaccine_id,
            center_id: slot_center,
            slot_id,
            payment_method: None,
            notes: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_seat_goes_to_exactly_one_of_two_simultaneous_bookings() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 1, 0);
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let orchestrator = Arc::clone(&harness.orchestrator);
            let barrier = Arc::clone(&barrier);
            let model = booking(vaccine.id, center_id, slot.id);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                orchestrator
                    .book_appointment(&customer(), model, "127.0.0.1")
                    .await
            }));
        }

        let mut booked = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(BookingError::SlotFull(id)) => {
                    assert_eq!(id, slot.id);
                    full += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((booked, full), (1, 1));
        let slot = harness.store.slot(slot.id).unwrap();
        assert_eq!(slot.current_bookings, 1);
        assert!(!slot.is_available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_never_overfill_a_slot() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 3, 0);
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orchestrator = Arc::clone(&harness.orchestrator);
            let barrier = Arc::clone(&barrier);
            let model = booking(vaccine.id, center_id, slot.id);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                orchestrator
                    .book_appointment(&customer(), model, "127.0.0.1")
                    .await
            }));
        }

        let mut booked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(err) => assert!(matches!(err, BookingError::SlotFull(_))),
            }
        }

        assert_eq!(booked, 3);
        let slot = harness.store.slot(slot.id).unwrap();
        assert_eq!(slot.current_bookings, 3);
        assert!(slot.is_consistent());
    }

    #[tokio::test]
    async fn cash_booking_is_confirmed_and_cancel_restores_the_seat() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(Some(200_000), 2);
        let slot = harness.store.seed_slot(center_id, 5, 2);
        let actor = customer();

        let booked = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();

        assert_eq!(booked.appointment.status, "CONFIRMED");
        assert_eq!(booked.appointment.dose_number, 1);
        assert!(booked.appointment.booking_code.starts_with("BK-"));
        assert_eq!(booked.payment.as_ref().unwrap().payment_method, "CASH");
        assert!(booked.payment_url.is_none());
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 3);

        let cancelled = harness
            .orchestrator
            .cancel_appointment(&actor, booked.appointment.id, Some("travel".to_string()))
            .await
            .unwrap();

        assert!(cancelled.changed);
        assert_eq!(cancelled.appointment.status, "CANCELLED");
        assert_eq!(cancelled.appointment.cancellation_reason.as_deref(), Some("travel"));
        assert_eq!(cancelled.cancellation_fee, None);
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 2);
        assert_eq!(harness.store.history_of(booked.appointment.id).len(), 2);
    }

    #[tokio::test]
    async fn cancelling_twice_releases_the_seat_once() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 2, 0);
        let actor = customer();

        let booked = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        harness
            .orchestrator
            .cancel_appointment(&actor, booked.appointment.id, None)
            .await
            .unwrap();
        let again = harness
            .orchestrator
            .cancel_appointment(&actor, booked.appointment.id, None)
            .await
            .unwrap();

        assert!(!again.changed);
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 0);
        assert_eq!(
            harness.notifier.kinds(),
            vec![AppointmentEventKind::Created, AppointmentEventKind::Cancelled]
        );
    }

    #[tokio::test]
    async fn gateway_booking_waits_for_payment_with_a_url() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(Some(350_000), 1);
        let slot = harness.store.seed_slot(center_id, 5, 0);

        let booked = harness
            .orchestrator
            .book_appointment(
                &customer(),
                BookAppointmentModel {
                    payment_method: Some(PaymentMethod::VnPay),
                    ..booking(vaccine.id, center_id, slot.id)
                },
                "10.0.0.7",
            )
            .await
            .unwrap();

        assert_eq!(booked.appointment.status, "PENDING");
        assert_eq!(booked.payment.unwrap().payment_status, "PENDING");
        assert!(
            booked
                .payment_url
                .unwrap()
                .contains(&booked.appointment.booking_code)
        );
    }

    #[tokio::test]
    async fn patient_who_has_all_doses_cannot_book_another() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let first = harness.store.seed_slot(center_id, 5, 0);
        let second = harness.store.seed_slot(center_id, 5, 0);
        let actor = customer();

        harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, first.id), "127.0.0.1")
            .await
            .unwrap();
        let err = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, second.id), "127.0.0.1")
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation(_)));
        assert_eq!(harness.store.slot(second.id).unwrap().current_bookings, 0);
    }

    #[tokio::test]
    async fn customer_cannot_cancel_someone_elses_booking() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 5, 0);

        let booked = harness
            .orchestrator
            .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        let err = harness
            .orchestrator
            .cancel_appointment(&customer(), booked.appointment.id, None)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Forbidden(_)));
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 1);
    }

    #[tokio::test]
    async fn reschedule_moves_the_seat_between_slots() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let old_slot = harness.store.seed_slot(center_id, 5, 0);
        let new_slot = harness.store.seed_slot(center_id, 5, 0);
        let actor = customer();

        let booked = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, old_slot.id), "127.0.0.1")
            .await
            .unwrap();
        let moved = harness
            .orchestrator
            .reschedule(&actor, booked.appointment.id, new_slot.id)
            .await
            .unwrap();

        assert_eq!(moved.status, "RESCHEDULED");
        assert_eq!(moved.slot_id, Some(new_slot.id));
        assert_eq!(harness.store.slot(old_slot.id).unwrap().current_bookings, 0);
        assert_eq!(harness.store.slot(new_slot.id).unwrap().current_bookings, 1);
    }

    #[tokio::test]
    async fn reschedule_into_full_slot_keeps_the_old_seat() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let old_slot = harness.store.seed_slot(center_id, 5, 0);
        let full_slot = harness.store.seed_slot(center_id, 1, 1);
        let actor = customer();

        let booked = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, old_slot.id), "127.0.0.1")
            .await
            .unwrap();
        let err = harness
            .orchestrator
            .reschedule(&actor, booked.appointment.id, full_slot.id)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::SlotFull(_)));
        let unchanged = harness.store.appointment(booked.appointment.id).unwrap();
        assert_eq!(unchanged.slot_id, Some(old_slot.id));
        assert_eq!(harness.store.slot(old_slot.id).unwrap().current_bookings, 1);
        assert_eq!(harness.store.slot(full_slot.id).unwrap().current_bookings, 1);
    }

    #[tokio::test]
    async fn guest_consultation_has_no_slot() {
        let harness = Harness::new();

        let appointment = harness
            .orchestrator
            .request_consultation(
                None,
                ConsultationRequestModel {
                    vaccine_id: None,
                    family_member_id: None,
                    guest: Some(GuestPatient {
                        full_name: "Tran Thi B".to_string(),
                        email: None,
                        phone: Some("0912345678".to_string()),
                        date_of_birth: None,
                    }),
                    notes: Some("which vaccine for travel?".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(appointment.status, "PENDING");
        assert!(appointment.requires_consultation);
        assert_eq!(appointment.slot_id, None);
        assert_eq!(appointment.center_id, None);
        assert_eq!(appointment.patient_kind, "GUEST");
    }

    #[tokio::test]
    async fn walk_in_is_confirmed_and_checked_in_with_queue_number() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(Some(120_000), 1);
        let receptionist = ActorContext::new(Uuid::new_v4(), Role::Receptionist, Some(center_id));

        let walk_in = harness
            .orchestrator
            .create_walk_in(
                &receptionist,
                WalkInModel {
                    guest: GuestPatient {
                        full_name: "Le Van C".to_string(),
                        email: None,
                        phone: None,
                        date_of_birth: None,
                    },
                    vaccine_id: vaccine.id,
                    center_id,
                    slot_id: None,
                    appointment_date: None,
                    appointment_time: None,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(walk_in.appointment.status, "CONFIRMED");
        assert_eq!(walk_in.payment.unwrap().payment_method, "CASH");

        let checked_in = harness
            .orchestrator
            .advance_status(
                &receptionist,
                walk_in.appointment.id,
                AppointmentStatus::CheckedIn,
                None,
            )
            .await
            .unwrap();

        assert_eq!(checked_in.appointment.status, "CHECKED_IN");
        assert_eq!(checked_in.appointment.queue_number, Some(1));
    }

    #[tokio::test]
    async fn admin_cannot_delete_an_appointment_after_injection() {
        let harness = Harness::new();
        let appointment = harness.store.seed_appointment(
            AppointmentStatus::Monitoring,
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let admin = ActorContext::new(Uuid::new_v4(), Role::Admin, None);

        let err = harness
            .orchestrator
            .delete_appointment(&admin, appointment.id)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Validation(_)));
        assert!(harness.store.appointment(appointment.id).is_some());
    }

    #[tokio::test]
    async fn deleting_a_cancelled_booking_does_not_release_its_seat_again() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 3, 0);
        let actor = customer();
        let admin = ActorContext::new(Uuid::new_v4(), Role::Admin, None);

        let kept = harness
            .orchestrator
            .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        let cancelled = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        harness
            .orchestrator
            .cancel_appointment(&actor, cancelled.appointment.id, None)
            .await
            .unwrap();
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 1);

        harness
            .orchestrator
            .delete_appointment(&admin, cancelled.appointment.id)
            .await
            .unwrap();

        assert!(harness.store.appointment(cancelled.appointment.id).is_none());
        assert!(harness.store.appointment(kept.appointment.id).is_some());
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 1);

        let again = harness
            .orchestrator
            .delete_appointment(&admin, cancelled.appointment.id)
            .await
            .unwrap_err();
        assert!(matches!(again, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_booking_frees_its_seat() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 3, 0);
        let admin = ActorContext::new(Uuid::new_v4(), Role::Admin, None);

        let booked = harness
            .orchestrator
            .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        harness
            .orchestrator
            .delete_appointment(&admin, booked.appointment.id)
            .await
            .unwrap();

        assert!(harness.store.payment(booked.appointment.id).is_none());
        assert!(harness.store.history_of(booked.appointment.id).is_empty());
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 0);
    }

    #[tokio::test]
    async fn taken_booking_code_is_replaced_with_a_fresh_one() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 3, 0);
        harness.store.clash_next_booking_codes(2);

        let booked = harness
            .orchestrator
            .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();

        assert!(harness.store.appointment(booked.appointment.id).is_some());
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 1);
    }

    #[tokio::test]
    async fn booking_gives_the_seat_back_when_no_code_is_free() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 3, 0);
        harness.store.clash_next_booking_codes(BOOKING_CODE_ATTEMPTS as usize);

        let err = harness
            .orchestrator
            .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Internal(_)));
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 0);
    }

    #[tokio::test]
    async fn a_busy_second_of_bookings_all_succeed_with_distinct_codes() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let slot = harness.store.seed_slot(center_id, 150, 0);

        let mut codes = std::collections::HashSet::new();
        for _ in 0..150 {
            let booked = harness
                .orchestrator
                .book_appointment(&customer(), booking(vaccine.id, center_id, slot.id), "127.0.0.1")
                .await
                .unwrap();
            codes.insert(booked.appointment.booking_code);
        }

        assert_eq!(codes.len(), 150);
        assert_eq!(harness.store.slot(slot.id).unwrap().current_bookings, 150);
    }

    #[tokio::test]
    async fn queue_numbers_are_counted_per_center() {
        let harness = Harness::new();
        let vaccine = harness.store.seed_vaccine(None, 1);
        let admin = ActorContext::new(Uuid::new_v4(), Role::Admin, None);
        let north = Uuid::new_v4();
        let south = Uuid::new_v4();

        let mut queue = Vec::new();
        for center_id in [north, south, north] {
            let appointment =
                harness
                    .store
                    .seed_appointment(AppointmentStatus::Confirmed, center_id, vaccine.id);
            let checked_in = harness
                .orchestrator
                .advance_status(&admin, appointment.id, AppointmentStatus::CheckedIn, None)
                .await
                .unwrap();
            queue.push(checked_in.appointment.queue_number);
        }

        assert_eq!(queue, vec![Some(1), Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn trace_collects_payment_and_history() {
        let harness = Harness::new();
        let center_id = Uuid::new_v4();
        let vaccine = harness.store.seed_vaccine(Some(90_000), 1);
        let slot = harness.store.seed_slot(center_id, 5, 0);
        let actor = customer();

        let booked = harness
            .orchestrator
            .book_appointment(&actor, booking(vaccine.id, center_id, slot.id), "127.0.0.1")
            .await
            .unwrap();
        let trace = harness
            .orchestrator
            .trace(&actor, &booked.appointment.booking_code)
            .await
            .unwrap();

        assert_eq!(trace.appointment.id, booked.appointment.id);
        assert!(trace.payment.is_some());
        assert!(trace.screening.is_none());
        assert_eq!(trace.history.len(), 1);
        assert_eq!(trace.history[0].old_status, None);
    }
}
