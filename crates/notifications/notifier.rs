use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{AppointmentEvent, AppointmentNotifier};

const QUEUE_CAPACITY: usize = 256;

#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    async fn send(&self, event: &AppointmentEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Bounded queue drained by a background task that fans out to every provider.
#[derive(Clone)]
pub struct QueuedNotifier {
    tx: mpsc::Sender<AppointmentEvent>,
}

impl QueuedNotifier {
    /// Must be called inside a tokio runtime.
    pub fn new(providers: Vec<Arc<dyn DeliveryProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AppointmentEvent>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&event).await {
                        warn!(
                            provider = provider.provider_name(),
                            appointment_id = %event.appointment_id,
                            error = %error,
                            "notifications: provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }
}

impl AppointmentNotifier for QueuedNotifier {
    fn publish(&self, event: AppointmentEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    appointment_id = %event.appointment_id,
                    "notifications: queue full; dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                warn!(
                    appointment_id = %event.appointment_id,
                    "notifications: queue closed; dropping event"
                );
            }
        }
    }
}

/// Writes events to the log; used when no webhook is configured.
pub struct LogProvider;

#[async_trait]
impl DeliveryProvider for LogProvider {
    async fn send(&self, event: &AppointmentEvent) -> Result<()> {
        info!(
            kind = ?event.kind,
            appointment_id = %event.appointment_id,
            booking_code = %event.booking_code,
            status = %event.status,
            "notifications: appointment event"
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "log"
    }
}
