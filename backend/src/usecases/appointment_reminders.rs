use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use crates::{
    domain::{
        repositories::appointments::AppointmentRepository,
        value_objects::enums::appointment_statuses::AppointmentStatus,
    },
    notifications::{AppointmentEventKind, AppointmentNotifier},
};
use tracing::info;

use super::{
    appointment_state_machine::appointment_event,
    errors::{UseCaseResult, storage_failure},
};

/// Hours ahead of the appointment at which a reminder window opens. Each window is
/// one hour wide, matching the default run interval.
const REMINDER_LEAD_HOURS: [i64; 2] = [24, 2];

pub struct AppointmentReminders {
    appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl AppointmentReminders {
    pub fn new(
        appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            appointment_repository,
            notifier,
        }
    }

    /// Publishes a reminder for every live appointment starting inside one of the
    /// lead windows. Returns how many were sent.
    pub async fn send_due_reminders(&self, now: NaiveDateTime) -> UseCaseResult<usize> {
        let statuses = vec![
            AppointmentStatus::Pending.as_str().to_string(),
            AppointmentStatus::Confirmed.as_str().to_string(),
        ];

        let mut sent = 0;
        for lead in REMINDER_LEAD_HOURS {
            let from = now + Duration::hours(lead);
            let to = from + Duration::hours(1);
            let due = self
                .appointment_repository
                .list_scheduled_between(from, to, statuses.clone())
                .await
                .map_err(storage_failure("reminders: list upcoming appointments"))?;

            for appointment in &due {
                self.notifier.publish(appointment_event(
                    AppointmentEventKind::Reminder,
                    appointment,
                    Some(format!("Your appointment starts in about {lead} hours")),
                ));
            }
            sent += due.len();
        }

        if sent > 0 {
            info!(sent, "reminders: reminders published");
        }
        Ok(sent)
    }
}
