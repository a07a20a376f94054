use anyhow::Result;
use backend::{config::config_model::Worker, usecases::vaccine_lot_ledger::VaccineLotLedger};
use chrono::{Local, NaiveDate};
use crates::domain::value_objects::vaccinations::LotSweepReport;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub async fn run(lot_ledger: Arc<VaccineLotLedger>, schedule: Worker) -> Result<()> {
    info!(
        interval_secs = schedule.sweep_interval_secs,
        "lot_maintenance: starting worker loop"
    );
    loop {
        let today = Local::now().date_naive();
        if let Err(e) = maintain_lots(&lot_ledger, today, &schedule).await {
            error!(error = %e, "lot_maintenance: sweep failed");
        }

        tokio::time::sleep(Duration::from_secs(schedule.sweep_interval_secs)).await;
    }
}

/// Corrects stored lot statuses, then logs every expiry and low-stock warning.
pub async fn maintain_lots(
    lot_ledger: &VaccineLotLedger,
    today: NaiveDate,
    schedule: &Worker,
) -> Result<LotSweepReport> {
    let report = lot_ledger.sweep_statuses(today).await?;
    info!(
        scanned = report.scanned,
        expired = report.expired,
        depleted = report.depleted,
        restored = report.restored,
        "lot_maintenance: sweep finished"
    );

    let warnings = lot_ledger
        .warnings(
            today,
            schedule.expiry_warning_days,
            schedule.low_stock_threshold,
        )
        .await?;
    for warning in &warnings {
        warn!(
            kind = ?warning.kind,
            lot_number = %warning.lot.lot_number,
            remaining = warning.lot.remaining_quantity,
            days_until_expiry = warning.days_until_expiry,
            "lot_maintenance: lot needs attention"
        );
    }

    Ok(report)
}
