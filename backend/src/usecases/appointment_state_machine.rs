use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::{
            appointment_histories::InsertAppointmentHistoryEntity,
            appointments::{AppointmentEntity, AppointmentStatusChangeset},
        },
        repositories::{
            appointments::AppointmentRepository, vaccination_records::VaccinationRecordRepository,
        },
        value_objects::{
            actors::ActorContext,
            appointments::{QueueDay, StatusChangeCommand},
            enums::{appointment_statuses::AppointmentStatus, roles::Role},
        },
    },
    notifications::{AppointmentEvent, AppointmentEventKind, AppointmentNotifier},
};
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{BookingError, UseCaseResult, storage_failure};

pub const MISSING_RECORD_WARNING: &str = "no vaccination record exists for this appointment";

/// Whether `role` may move an appointment along `from -> to`.
pub fn is_edge_allowed(from: AppointmentStatus, to: AppointmentStatus, role: Role) -> bool {
    use AppointmentStatus::*;

    if from == to {
        return true;
    }
    if from.is_terminal() {
        return false;
    }

    match role {
        Role::Admin => true,
        Role::System => matches!((from, to), (Pending, Confirmed)),
        Role::Receptionist => matches!(
            (from, to),
            (Pending, Confirmed)
                | (Rescheduled, Confirmed)
                | (Pending | Confirmed | Rescheduled, CheckedIn)
                | (CheckedIn, Screening)
                | (Pending | Confirmed | Rescheduled | CheckedIn, Cancelled)
                | (Pending | Confirmed, Rescheduled)
        ),
        Role::Doctor => matches!(
            (from, to),
            (CheckedIn, Screening)
                | (Screening, Approved | Rejected)
                | (Approved, Rejected)
                | (Rejected, Approved)
                | (Approved, Injecting)
                | (Rejected, Cancelled)
        ),
        Role::Nurse => matches!(
            (from, to),
            (Approved, Injecting) | (Injecting, Monitoring) | (Monitoring, Completed)
        ),
        Role::Customer => matches!(
            (from, to),
            (Pending | Confirmed, Cancelled) | (Pending | Confirmed, Rescheduled)
        ),
    }
}

pub fn authorize_edge(
    from: AppointmentStatus,
    to: AppointmentStatus,
    actor: &ActorContext,
) -> UseCaseResult<()> {
    if is_edge_allowed(from, to, actor.role) {
        Ok(())
    } else {
        Err(BookingError::InvalidTransition {
            from,
            to,
            role: actor.role,
        })
    }
}

/// Customers see their own bookings; staff see their center's.
pub fn ensure_access(actor: &ActorContext, appointment: &AppointmentEntity) -> UseCaseResult<()> {
    match actor.role {
        Role::Admin | Role::System => Ok(()),
        Role::Customer => {
            if actor.actor_id.is_some() && appointment.booked_by_user_id == actor.actor_id {
                Ok(())
            } else {
                Err(BookingError::Forbidden(
                    "appointment belongs to another account".to_string(),
                ))
            }
        }
        _ => {
            if actor.works_at(appointment.center_id) {
                Ok(())
            } else {
                Err(BookingError::CenterMismatch)
            }
        }
    }
}

pub fn history_entry(
    appointment_id: Uuid,
    from: Option<AppointmentStatus>,
    to: AppointmentStatus,
    actor: &ActorContext,
    reason: Option<String>,
) -> InsertAppointmentHistoryEntity {
    InsertAppointmentHistoryEntity {
        appointment_id,
        old_status: from.map(|status| status.as_str().to_string()),
        new_status: to.as_str().to_string(),
        changed_by: actor.actor_id,
        changed_by_role: actor.role.as_str().to_string(),
        reason,
        changed_at: Utc::now(),
    }
}

pub fn appointment_event(
    kind: AppointmentEventKind,
    appointment: &AppointmentEntity,
    message: Option<String>,
) -> AppointmentEvent {
    AppointmentEvent {
        kind,
        appointment_id: appointment.id,
        booking_code: appointment.booking_code.clone(),
        status: appointment.status.clone(),
        scheduled_at: appointment.scheduled_at(),
        message,
        occurred_at: Utc::now(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    pub reason: Option<String>,
    pub cancellation_fee: Option<i64>,
    pub assign_queue_on: Option<QueueDay>,
}

impl TransitionOptions {
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub appointment: AppointmentEntity,
    pub previous: AppointmentStatus,
    pub changed: bool,
    pub warnings: Vec<String>,
}

pub struct AppointmentStateMachine {
    appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
    record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl AppointmentStateMachine {
    pub fn new(
        appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
        record_repository: Arc<dyn VaccinationRecordRepository + Send + Sync>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            appointment_repository,
            record_repository,
            notifier,
        }
    }

    pub async fn load(&self, appointment_id: Uuid) -> UseCaseResult<AppointmentEntity> {
        self.appointment_repository
            .find_by_id(appointment_id)
            .await
            .map_err(storage_failure("appointments: load appointment"))?
            .ok_or(BookingError::NotFound("appointment"))
    }

    /// Applies one edge. Same-state requests return `changed == false` without writing.
    pub async fn transition(
        &self,
        appointment: &AppointmentEntity,
        to: AppointmentStatus,
        actor: &ActorContext,
        options: TransitionOptions,
    ) -> UseCaseResult<TransitionOutcome> {
        let from = appointment.current_status()?;
        authorize_edge(from, to, actor)?;

        if from == to {
            info!(
                appointment_id = %appointment.id,
                status = %to,
                "appointments: status unchanged"
            );
            return Ok(TransitionOutcome {
                appointment: appointment.clone(),
                previous: from,
                changed: false,
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();
        if to == AppointmentStatus::Completed {
            let record = self
                .record_repository
                .find_by_appointment_id(appointment.id)
                .await
                .map_err(storage_failure("appointments: load vaccination record"))?;
            if record.is_none() {
                warn!(
                    appointment_id = %appointment.id,
                    "appointments: completing without a vaccination record"
                );
                warnings.push(MISSING_RECORD_WARNING.to_string());
            }
        }

        let cancelling = to == AppointmentStatus::Cancelled;
        let command = StatusChangeCommand {
            appointment_id: appointment.id,
            expected_version: appointment.version,
            changes: AppointmentStatusChangeset {
                status: to.as_str().to_string(),
                cancellation_reason: options.reason.clone().filter(|_| cancelling),
                queue_number: None,
                updated_at: Utc::now(),
            },
            release_slot_id: appointment.slot_id.filter(|_| cancelling),
            assign_queue_on: options.assign_queue_on,
            cancellation_fee: options.cancellation_fee.filter(|_| cancelling),
            history: history_entry(appointment.id, Some(from), to, actor, options.reason),
        };

        let updated = self
            .appointment_repository
            .apply_status_change(command)
            .await
            .map_err(storage_failure("appointments: apply status change"))?;

        let updated = match updated {
            Some(updated) => updated,
            None => {
                // Lost the version race; a concurrent writer may already have done our work.
                let current = self.load(appointment.id).await?;
                if current.current_status()? == to {
                    info!(
                        appointment_id = %appointment.id,
                        status = %to,
                        "appointments: concurrent writer already applied status"
                    );
                    return Ok(TransitionOutcome {
                        appointment: current,
                        previous: from,
                        changed: false,
                        warnings,
                    });
                }
                warn!(
                    appointment_id = %appointment.id,
                    expected_version = appointment.version,
                    "appointments: stale version on status change"
                );
                return Err(BookingError::Conflict(appointment.id));
            }
        };

        info!(
            appointment_id = %updated.id,
            from = %from,
            to = %to,
            role = %actor.role,
            "appointments: status changed"
        );

        let kind = if cancelling {
            AppointmentEventKind::Cancelled
        } else {
            AppointmentEventKind::StatusChanged
        };
        self.notifier.publish(appointment_event(kind, &updated, None));

        Ok(TransitionOutcome {
            appointment: updated,
            previous: from,
            changed: true,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use crates::{
        domain::repositories::{
            appointments::MockAppointmentRepository,
            vaccination_records::MockVaccinationRecordRepository,
        },
        notifications::MockAppointmentNotifier,
    };
    use crates::domain::value_objects::enums::appointment_statuses::AppointmentStatus::*;
    use mockall::predicate::eq;

    const ALL: [AppointmentStatus; 11] = [
        Pending,
        Confirmed,
        CheckedIn,
        Screening,
        Approved,
        Rejected,
        Injecting,
        Monitoring,
        Completed,
        Cancelled,
        Rescheduled,
    ];

    fn sample_appointment(status: AppointmentStatus) -> AppointmentEntity {
        let now = Utc::now();
        AppointmentEntity {
            id: Uuid::new_v4(),
            booking_code: "BK-20300101-080000-001".to_string(),
            booked_by_user_id: Some(Uuid::new_v4()),
            patient_kind: "REGISTERED".to_string(),
            patient_user_id: Some(Uuid::new_v4()),
            family_member_id: None,
            guest_full_name: None,
            guest_email: None,
            guest_phone: None,
            guest_date_of_birth: None,
            vaccine_id: Some(Uuid::new_v4()),
            center_id: Some(Uuid::new_v4()),
            slot_id: Some(Uuid::new_v4()),
            room_id: None,
            appointment_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            appointment_time: NaiveTime::from_hms_opt(8, 0, 0),
            status: status.as_str().to_string(),
            dose_number: 1,
            queue_number: None,
            requires_consultation: false,
            cancellation_reason: None,
            notes: None,
            version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    fn nurse() -> ActorContext {
        ActorContext::new(Uuid::new_v4(), Role::Nurse, None)
    }

    #[test]
    fn terminal_states_have_no_exits_for_anyone() {
        for role in [Role::Admin, Role::Receptionist, Role::Doctor, Role::Nurse, Role::System] {
            for to in ALL {
                if to != Completed {
                    assert!(!is_edge_allowed(Completed, to, role), "{role} {to}");
                }
                if to != Cancelled {
                    assert!(!is_edge_allowed(Cancelled, to, role), "{role} {to}");
                }
            }
        }
    }

    #[test]
    fn clinical_edges_are_role_bound() {
        assert!(is_edge_allowed(Screening, Approved, Role::Doctor));
        assert!(!is_edge_allowed(Screening, Approved, Role::Nurse));
        assert!(is_edge_allowed(Injecting, Monitoring, Role::Nurse));
        assert!(!is_edge_allowed(Injecting, Monitoring, Role::Receptionist));
        assert!(!is_edge_allowed(Rejected, Injecting, Role::Nurse));
        assert!(is_edge_allowed(Rejected, Approved, Role::Doctor));
        assert!(is_edge_allowed(Pending, Confirmed, Role::System));
        assert!(!is_edge_allowed(Confirmed, CheckedIn, Role::System));
    }

    #[test]
    fn customers_only_cancel_or_reschedule_before_arrival() {
        assert!(is_edge_allowed(Confirmed, Cancelled, Role::Customer));
        assert!(is_edge_allowed(Pending, Rescheduled, Role::Customer));
        assert!(!is_edge_allowed(CheckedIn, Cancelled, Role::Customer));
        assert!(!is_edge_allowed(Pending, Confirmed, Role::Customer));
    }

    #[tokio::test]
    async fn rejects_illegal_edge_without_writing() {
        let appointment = sample_appointment(Rejected);

        let mut appointment_repo = MockAppointmentRepository::new();
        appointment_repo.expect_apply_status_change().never();
        let machine = AppointmentStateMachine::new(
            Arc::new(appointment_repo),
            Arc::new(MockVaccinationRecordRepository::new()),
            Arc::new(MockAppointmentNotifier::new()),
        );

        let err = machine
            .transition(&appointment, Injecting, &nurse(), TransitionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: Rejected,
                to: Injecting,
                role: Role::Nurse
            }
        ));
    }

    #[tokio::test]
    async fn completing_without_record_warns_but_succeeds() {
        let appointment = sample_appointment(Monitoring);
        let appointment_id = appointment.id;
        let mut completed = appointment.clone();
        completed.status = Completed.as_str().to_string();
        completed.version += 1;

        let mut record_repo = MockVaccinationRecordRepository::new();
        record_repo
            .expect_find_by_appointment_id()
            .with(eq(appointment_id))
            .returning(|_| Box::pin(async move { Ok(None) }));

        let mut appointment_repo = MockAppointmentRepository::new();
        appointment_repo
            .expect_apply_status_change()
            .withf(move |command| {
                command.appointment_id == appointment_id
                    && command.expected_version == 3
                    && command.release_slot_id.is_none()
                    && command.history.new_status == "COMPLETED"
            })
            .returning(move |_| {
                let completed = completed.clone();
                Box::pin(async move { Ok(Some(completed)) })
            });

        let mut notifier = MockAppointmentNotifier::new();
        notifier
            .expect_publish()
            .withf(|event| event.kind == AppointmentEventKind::StatusChanged)
            .times(1)
            .return_const(());

        let machine = AppointmentStateMachine::new(
            Arc::new(appointment_repo),
            Arc::new(record_repo),
            Arc::new(notifier),
        );

        let outcome = machine
            .transition(&appointment, Completed, &nurse(), TransitionOptions::default())
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.appointment.status, "COMPLETED");
        assert_eq!(outcome.warnings, vec![MISSING_RECORD_WARNING.to_string()]);
    }

    #[tokio::test]
    async fn cancellation_releases_slot_in_the_same_command() {
        let appointment = sample_appointment(Confirmed);
        let slot_id = appointment.slot_id;
        let mut cancelled = appointment.clone();
        cancelled.status = Cancelled.as_str().to_string();

        let mut appointment_repo = MockAppointmentRepository::new();
        appointment_repo
            .expect_apply_status_change()
            .withf(move |command| {
                command.release_slot_id == slot_id
                    && command.changes.cancellation_reason.as_deref() == Some("sick")
                    && command.cancellation_fee == Some(20_000)
            })
            .times(1)
            .returning(move |_| {
                let cancelled = cancelled.clone();
                Box::pin(async move { Ok(Some(cancelled)) })
            });

        let mut notifier = MockAppointmentNotifier::new();
        notifier
            .expect_publish()
            .withf(|event| event.kind == AppointmentEventKind::Cancelled)
            .return_const(());

        let machine = AppointmentStateMachine::new(
            Arc::new(appointment_repo),
            Arc::new(MockVaccinationRecordRepository::new()),
            Arc::new(notifier),
        );
        let receptionist = ActorContext::new(Uuid::new_v4(), Role::Receptionist, None);

        let outcome = machine
            .transition(
                &appointment,
                Cancelled,
                &receptionist,
                TransitionOptions {
                    reason: Some("sick".to_string()),
                    cancellation_fee: Some(20_000),
                    assign_queue_on: None,
                },
            )
            .await
            .unwrap();

        assert!(outcome.changed);
        assert_eq!(outcome.previous, Confirmed);
    }

    #[tokio::test]
    async fn stale_version_surfaces_conflict() {
        let appointment = sample_appointment(Approved);
        let appointment_id = appointment.id;
        let mut moved_on = appointment.clone();
        moved_on.status = Rejected.as_str().to_string();

        let mut appointment_repo = MockAppointmentRepository::new();
        appointment_repo
            .expect_apply_status_change()
            .returning(|_| Box::pin(async move { Ok(None) }));
        appointment_repo
            .expect_find_by_id()
            .with(eq(appointment_id))
            .returning(move |_| {
                let moved_on = moved_on.clone();
                Box::pin(async move { Ok(Some(moved_on)) })
            });

        let machine = AppointmentStateMachine::new(
            Arc::new(appointment_repo),
            Arc::new(MockVaccinationRecordRepository::new()),
            Arc::new(MockAppointmentNotifier::new()),
        );

        let err = machine
            .transition(&appointment, Injecting, &nurse(), TransitionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::Conflict(id) if id == appointment_id));
    }
}
