mod notifier;
mod webhook;

use chrono::{DateTime, NaiveDateTime, Utc};
use mockall::automock;
use serde::Serialize;
use uuid::Uuid;

pub use notifier::{DeliveryProvider, LogProvider, QueuedNotifier};
pub use webhook::WebhookProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    Created,
    StatusChanged,
    Cancelled,
    Reminder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment_id: Uuid,
    pub booking_code: String,
    pub status: String,
    pub scheduled_at: Option<NaiveDateTime>,
    pub message: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Fire-and-forget sink for appointment events; delivery failures never reach the caller.
#[automock]
pub trait AppointmentNotifier: Send + Sync {
    fn publish(&self, event: AppointmentEvent);
}
