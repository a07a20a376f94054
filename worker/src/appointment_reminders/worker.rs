use anyhow::Result;
use backend::usecases::appointment_reminders::AppointmentReminders;
use chrono::Local;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run(reminders: Arc<AppointmentReminders>, interval_secs: u64) -> Result<()> {
    info!(interval_secs, "appointment_reminders: starting worker loop");
    loop {
        if let Err(e) = reminders
            .send_due_reminders(Local::now().naive_local())
            .await
        {
            error!(error = %e, "appointment_reminders: reminder pass failed");
        }

        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
}
