pub mod appointment_reminders;
pub mod appointment_state_machine;
pub mod booking_orchestrator;
pub mod codes;
pub mod errors;
pub mod payment_reconciler;
pub mod screening_gate;
pub mod slot_ledger;
pub mod vaccination_recorder;
pub mod vaccine_lot_ledger;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use crates::{
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            appointment_slots::AppointmentSlotPostgres, appointments::AppointmentPostgres,
            family_members::FamilyMemberPostgres, payments::PaymentPostgres,
            screenings::ScreeningPostgres, vaccination_records::VaccinationRecordPostgres,
            vaccine_lots::VaccineLotPostgres, vaccines::VaccinePostgres,
        },
    },
    notifications::AppointmentNotifier,
};

use appointment_reminders::AppointmentReminders;
use appointment_state_machine::AppointmentStateMachine;
use booking_orchestrator::BookingOrchestrator;
use payment_reconciler::{PaymentGateway, PaymentReconciler};
use screening_gate::ScreeningGate;
use slot_ledger::SlotLedger;
use vaccination_recorder::VaccinationRecorder;
use vaccine_lot_ledger::VaccineLotLedger;

/// Every use case wired once against the Postgres repositories, sharing one
/// state machine, gateway and notifier.
#[derive(Clone)]
pub struct UseCases {
    pub slot_ledger: Arc<SlotLedger>,
    pub lot_ledger: Arc<VaccineLotLedger>,
    pub state_machine: Arc<AppointmentStateMachine>,
    pub reconciler: Arc<PaymentReconciler>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub screening_gate: Arc<ScreeningGate>,
    pub recorder: Arc<VaccinationRecorder>,
    pub reminders: Arc<AppointmentReminders>,
}

impl UseCases {
    pub fn postgres(
        db_pool: Arc<PgPoolSquad>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        let appointment_repository = Arc::new(AppointmentPostgres::new(Arc::clone(&db_pool)));
        let slot_repository = Arc::new(AppointmentSlotPostgres::new(Arc::clone(&db_pool)));
        let family_member_repository = Arc::new(FamilyMemberPostgres::new(Arc::clone(&db_pool)));
        let payment_repository = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
        let screening_repository = Arc::new(ScreeningPostgres::new(Arc::clone(&db_pool)));
        let record_repository = Arc::new(VaccinationRecordPostgres::new(Arc::clone(&db_pool)));
        let lot_repository = Arc::new(VaccineLotPostgres::new(Arc::clone(&db_pool)));
        let vaccine_repository = Arc::new(VaccinePostgres::new(db_pool));

        let slot_ledger = Arc::new(SlotLedger::new(slot_repository));
        let lot_ledger = Arc::new(VaccineLotLedger::new(
            lot_repository,
            vaccine_repository.clone(),
        ));
        let state_machine = Arc::new(AppointmentStateMachine::new(
            appointment_repository.clone(),
            record_repository.clone(),
            Arc::clone(&notifier),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            payment_repository,
            appointment_repository.clone(),
            gateway,
            Arc::clone(&state_machine),
            Arc::clone(&notifier),
        ));
        let orchestrator = Arc::new(BookingOrchestrator::new(
            appointment_repository.clone(),
            vaccine_repository.clone(),
            family_member_repository,
            screening_repository.clone(),
            record_repository.clone(),
            Arc::clone(&slot_ledger),
            Arc::clone(&state_machine),
            Arc::clone(&reconciler),
            Arc::clone(&notifier),
        ));
        let screening_gate = Arc::new(ScreeningGate::new(
            screening_repository,
            vaccine_repository.clone(),
            Arc::clone(&state_machine),
            Arc::clone(&notifier),
        ));
        let recorder = Arc::new(VaccinationRecorder::new(
            record_repository,
            vaccine_repository,
            Arc::clone(&lot_ledger),
            Arc::clone(&state_machine),
            Arc::clone(&notifier),
        ));
        let reminders = Arc::new(AppointmentReminders::new(appointment_repository, notifier));

        Self {
            slot_ledger,
            lot_ledger,
            state_machine,
            reconciler,
            orchestrator,
            screening_gate,
            recorder,
            reminders,
        }
    }
}
