use std::sync::Arc;

use chrono::{Duration, Local};
use crates::{
    domain::{
        entities::{
            appointments::AppointmentEntity,
            vaccination_records::{InsertVaccinationRecordEntity, VaccinationRecordEntity},
            vaccine_lots::VaccineLotEntity,
        },
        repositories::{
            vaccination_records::VaccinationRecordRepository, vaccines::VaccineRepository,
        },
        value_objects::{
            actors::ActorContext,
            enums::{appointment_statuses::AppointmentStatus, roles::Role},
            vaccinations::{
                RecordVaccinationCommand, RecordVaccinationModel, RecordVaccinationOutcome,
            },
        },
    },
    notifications::{AppointmentEventKind, AppointmentNotifier},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    appointment_state_machine::{
        AppointmentStateMachine, appointment_event, authorize_edge, ensure_access, history_entry,
    },
    codes,
    errors::{BookingError, UseCaseResult, storage_failure},
    vaccine_lot_ledger::VaccineLotLedger,
};

const RECORDED_REASON: &str = "Vaccination recorded";

const CERTIFICATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RecordedVaccination {
    pub record: VaccinationRecordEntity,
    pub lot: VaccineLotEntity,
    pub appointment: AppointmentEntity,
}

pub struct VaccinationRecorder {
    record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
    vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
    lot_ledger: Arc<VaccineLotLedger>,
    state_machine: Arc<AppointmentStateMachine>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl VaccinationRecorder {
    pub fn new(
        record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
        vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
        lot_ledger: Arc<VaccineLotLedger>,
        state_machine: Arc<AppointmentStateMachine>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            record_repository,
            vaccine_repository,
            lot_ledger,
            state_machine,
            notifier,
        }
    }

    pub async fn find(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<Option<VaccinationRecordEntity>> {
        let appointment = self.state_machine.load(appointment_id).await?;
        ensure_access(actor, &appointment)?;
        self.record_repository
            .find_by_appointment_id(appointment_id)
            .await
            .map_err(storage_failure("vaccinations: load record"))
    }

    /// Draws one dose from the lot, writes the record and moves the appointment to
    /// MONITORING, all in one storage transaction.
    pub async fn record(
        &self,
        actor: &ActorContext,
        model: RecordVaccinationModel,
    ) -> UseCaseResult<RecordedVaccination> {
        if !matches!(actor.role, Role::Nurse | Role::Admin) {
            return Err(BookingError::Forbidden(
                "only nurses record vaccinations".to_string(),
            ));
        }

        let appointment = self.state_machine.load(model.appointment_id).await?;
        if !actor.works_at(appointment.center_id) {
            return Err(BookingError::CenterMismatch);
        }

        let existing = self
            .record_repository
            .find_by_appointment_id(appointment.id)
            .await
            .map_err(storage_failure("vaccinations: check existing record"))?;
        if existing.is_some() {
            warn!(appointment_id = %appointment.id, "vaccinations: duplicate record rejected");
            return Err(BookingError::DuplicateRecord(appointment.id));
        }

        let current = appointment.current_status()?;
        let path = match current {
            AppointmentStatus::Approved => {
                vec![AppointmentStatus::Injecting, AppointmentStatus::Monitoring]
            }
            AppointmentStatus::Injecting => vec![AppointmentStatus::Monitoring],
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other,
                    to: AppointmentStatus::Injecting,
                    role: actor.role,
                });
            }
        };
        let mut from = current;
        for step in &path {
            authorize_edge(from, *step, actor)?;
            from = *step;
        }

        let vaccine_id = appointment.vaccine_id.ok_or_else(|| {
            BookingError::Validation("appointment has no vaccine assigned".to_string())
        })?;
        let now = Local::now();
        let today = now.date_naive();

        let lot = self.lot_ledger.find_lot(model.vaccine_lot_id).await?;
        VaccineLotLedger::ensure_usable(&lot, vaccine_id, today)?;

        let vaccine = self
            .vaccine_repository
            .find_by_id(vaccine_id)
            .await
            .map_err(storage_failure("vaccinations: load vaccine"))?
            .ok_or(BookingError::NotFound("vaccine"))?;

        let details = model.details;
        let injection_date = details.injection_date.unwrap_or(today);
        let next_dose_date = if appointment.dose_number < vaccine.doses_required {
            vaccine
                .days_between_doses
                .map(|days| injection_date + Duration::days(i64::from(days)))
        } else {
            None
        };

        let mut histories = Vec::with_capacity(path.len());
        let mut from = current;
        for step in &path {
            histories.push(history_entry(
                appointment.id,
                Some(from),
                *step,
                actor,
                Some(RECORDED_REASON.to_string()),
            ));
            from = *step;
        }

        let mut command = RecordVaccinationCommand {
            record: InsertVaccinationRecordEntity {
                id: Uuid::new_v4(),
                appointment_id: appointment.id,
                vaccine_id,
                vaccine_lot_id: lot.id,
                nurse_id: actor.actor_id,
                injection_date,
                injection_time: details.injection_time.unwrap_or(now.time()),
                injection_site: details.injection_site,
                dose_number: appointment.dose_number,
                dose_amount: details.dose_amount,
                batch_number: lot.lot_number.clone(),
                certificate_number: codes::certificate_number(now),
                next_dose_date,
                notes: details.notes,
            },
            today,
            expected_version: appointment.version,
            final_status: AppointmentStatus::Monitoring.as_str().to_string(),
            histories,
        };

        let mut attempt = 1;
        let outcome = loop {
            let outcome = self
                .record_repository
                .record(command.clone())
                .await
                .map_err(storage_failure("vaccinations: record vaccination"))?;
            if outcome != RecordVaccinationOutcome::CertificateTaken
                || attempt == CERTIFICATE_ATTEMPTS
            {
                break outcome;
            }
            warn!(
                certificate_number = %command.record.certificate_number,
                attempt,
                "vaccinations: certificate number taken, drawing another"
            );
            command.record.certificate_number = codes::certificate_number(Local::now());
            attempt += 1;
        };

        match outcome {
            RecordVaccinationOutcome::Recorded {
                record,
                lot,
                appointment,
            } => {
                info!(
                    appointment_id = %appointment.id,
                    lot_id = %lot.id,
                    remaining_quantity = lot.remaining_quantity,
                    certificate_number = %record.certificate_number,
                    "vaccinations: vaccination recorded"
                );
                self.notifier.publish(appointment_event(
                    AppointmentEventKind::StatusChanged,
                    &appointment,
                    None,
                ));
                Ok(RecordedVaccination {
                    record,
                    lot,
                    appointment,
                })
            }
            RecordVaccinationOutcome::LotUnavailable => {
                warn!(lot_id = %model.vaccine_lot_id, "vaccinations: lot exhausted concurrently");
                Err(BookingError::LotUnavailable(format!(
                    "lot {} has no usable doses left",
                    lot.lot_number
                )))
            }
            RecordVaccinationOutcome::DuplicateRecord => {
                warn!(appointment_id = %appointment.id, "vaccinations: duplicate record rejected");
                Err(BookingError::DuplicateRecord(appointment.id))
            }
            RecordVaccinationOutcome::CertificateTaken => {
                error!(
                    appointment_id = %appointment.id,
                    attempts = CERTIFICATE_ATTEMPTS,
                    "vaccinations: no free certificate number"
                );
                Err(BookingError::Internal(anyhow::anyhow!(
                    "could not allocate a certificate number"
                )))
            }
            RecordVaccinationOutcome::StaleAppointment => {
                warn!(appointment_id = %appointment.id, "vaccinations: appointment changed concurrently");
                Err(BookingError::Conflict(appointment.id))
            }
        }
    }
}
