use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::{
            appointments::AppointmentEntity,
            screenings::{ScreeningEntity, UpsertScreeningEntity},
        },
        repositories::{screenings::ScreeningRepository, vaccines::VaccineRepository},
        value_objects::{
            actors::ActorContext,
            enums::{appointment_statuses::AppointmentStatus, roles::Role},
            screenings::{ScreeningDecisionCommand, ScreeningSubmission},
        },
    },
    notifications::{AppointmentEventKind, AppointmentNotifier},
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    appointment_state_machine::{
        AppointmentStateMachine, appointment_event, authorize_edge, history_entry,
    },
    errors::{BookingError, UseCaseResult, storage_failure},
};

#[derive(Debug, Clone)]
pub struct ScreeningOutcome {
    pub screening: ScreeningEntity,
    pub appointment: AppointmentEntity,
}

pub struct ScreeningGate {
    screening_repository: Arc<dyn ScreeningRepository + Send + Sync>,
    vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
    state_machine: Arc<AppointmentStateMachine>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl ScreeningGate {
    pub fn new(
        screening_repository: Arc<dyn ScreeningRepository + Send + Sync>,
        vaccine_repository: Arc<dyn VaccineRepository + Send + Sync>,
        state_machine: Arc<AppointmentStateMachine>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            screening_repository,
            vaccine_repository,
            state_machine,
            notifier,
        }
    }

    /// Statuses the appointment walks through to reach the screening decision.
    fn path_to(
        current: AppointmentStatus,
        target: AppointmentStatus,
        actor: &ActorContext,
    ) -> UseCaseResult<Vec<AppointmentStatus>> {
        let path = match current {
            AppointmentStatus::CheckedIn => vec![AppointmentStatus::Screening, target],
            AppointmentStatus::Screening
            | AppointmentStatus::Approved
            | AppointmentStatus::Rejected => vec![target],
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other,
                    to: target,
                    role: actor.role,
                });
            }
        };

        let mut from = current;
        for step in &path {
            authorize_edge(from, *step, actor)?;
            from = *step;
        }
        Ok(path)
    }

    pub async fn find(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<Option<ScreeningEntity>> {
        let appointment = self.state_machine.load(appointment_id).await?;
        if !actor.works_at(appointment.center_id) {
            return Err(BookingError::CenterMismatch);
        }
        self.screening_repository
            .find_by_appointment_id(appointment_id)
            .await
            .map_err(storage_failure("screenings: load screening"))
    }

    pub async fn submit(
        &self,
        actor: &ActorContext,
        submission: ScreeningSubmission,
    ) -> UseCaseResult<ScreeningOutcome> {
        if !matches!(actor.role, Role::Doctor | Role::Admin) {
            return Err(BookingError::Forbidden(
                "only doctors record screenings".to_string(),
            ));
        }

        let appointment = self.state_machine.load(submission.appointment_id).await?;
        if !actor.works_at(appointment.center_id) {
            return Err(BookingError::CenterMismatch);
        }

        let result = submission.result.unwrap_or_default();
        let target = result.target_status();
        let current = appointment.current_status()?;
        let path = Self::path_to(current, target, actor)?;

        let switch_vaccine_to = submission
            .vaccine_id
            .filter(|vaccine_id| appointment.vaccine_id != Some(*vaccine_id));
        if let Some(vaccine_id) = switch_vaccine_to {
            self.vaccine_repository
                .find_by_id(vaccine_id)
                .await
                .map_err(storage_failure("screenings: load vaccine"))?
                .ok_or(BookingError::NotFound("vaccine"))?;
        }

        let reason = match target {
            AppointmentStatus::Rejected => submission
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "Screening rejected".to_string()),
            _ => "Screening approved".to_string(),
        };
        let mut histories = Vec::with_capacity(path.len());
        let mut from = current;
        for step in path {
            if step != from {
                histories.push(history_entry(
                    appointment.id,
                    Some(from),
                    step,
                    actor,
                    Some(reason.clone()),
                ));
            }
            from = step;
        }
        let changed = !histories.is_empty();

        let command = ScreeningDecisionCommand {
            screening: UpsertScreeningEntity {
                appointment_id: appointment.id,
                doctor_id: actor.actor_id,
                body_temperature: submission.vitals.body_temperature,
                blood_pressure: submission.vitals.blood_pressure,
                heart_rate: submission.vitals.heart_rate,
                screening_result: result.as_str().to_string(),
                rejection_reason: submission.rejection_reason,
                notes: submission.notes,
                screened_at: Utc::now(),
            },
            expected_version: appointment.version,
            switch_vaccine_to,
            final_status: target.as_str().to_string(),
            histories,
        };

        let decided = self
            .screening_repository
            .record_decision(command)
            .await
            .map_err(storage_failure("screenings: record decision"))?;
        let Some((screening, updated)) = decided else {
            warn!(
                appointment_id = %appointment.id,
                expected_version = appointment.version,
                "screenings: appointment changed concurrently"
            );
            return Err(BookingError::Conflict(appointment.id));
        };

        if let Some(vaccine_id) = switch_vaccine_to {
            info!(
                appointment_id = %updated.id,
                %vaccine_id,
                "screenings: vaccine switched by doctor"
            );
        }
        info!(
            appointment_id = %updated.id,
            result = %result,
            "screenings: screening recorded"
        );
        if changed {
            self.notifier.publish(appointment_event(
                AppointmentEventKind::StatusChanged,
                &updated,
                None,
            ));
        }

        Ok(ScreeningOutcome {
            screening,
            appointment: updated,
        })
    }
}
