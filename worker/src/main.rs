use anyhow::Result;
use backend::{
    axum_http::http_serve::build_notifier,
    usecases::{
        appointment_reminders::AppointmentReminders, vaccine_lot_ledger::VaccineLotLedger,
    },
};
use crates::infra::db::{
    postgres::postgres_connection,
    repositories::{
        appointments::AppointmentPostgres, vaccine_lots::VaccineLotPostgres,
        vaccines::VaccinePostgres,
    },
};
use std::sync::Arc;
use tracing::{error, info};
use worker::{appointment_reminders, config, lot_maintenance};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let notifier = Arc::new(build_notifier(
        dotenvy_env.notifications.webhook_url.as_ref(),
    )?);

    let lot_ledger = Arc::new(VaccineLotLedger::new(
        Arc::new(VaccineLotPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(VaccinePostgres::new(Arc::clone(&db_pool_arc))),
    ));
    let reminders = Arc::new(AppointmentReminders::new(
        Arc::new(AppointmentPostgres::new(Arc::clone(&db_pool_arc))),
        notifier,
    ));

    let lot_maintenance_loop = tokio::spawn(lot_maintenance::worker::run(
        lot_ledger,
        dotenvy_env.schedule.clone(),
    ));

    let reminders_loop = tokio::spawn(appointment_reminders::worker::run(
        reminders,
        dotenvy_env.schedule.reminder_interval_secs,
    ));

    tokio::select! {
        result = lot_maintenance_loop => result??,
        result = reminders_loop => result??,
    };
    Ok(())
}
