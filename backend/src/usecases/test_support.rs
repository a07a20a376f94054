//! In-memory repositories with the same conditional-update semantics as the
//! Postgres implementations, for tests that need shared state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use crates::{
    domain::{
        entities::{
            appointment_histories::{AppointmentHistoryEntity, InsertAppointmentHistoryEntity},
            appointment_slots::{AppointmentSlotEntity, InsertAppointmentSlotEntity},
            appointments::{AppointmentEntity, InsertAppointmentEntity},
            family_members::FamilyMemberEntity,
            payments::{InsertPaymentEntity, PaymentEntity, PaymentSettlement},
            screenings::ScreeningEntity,
            vaccination_records::VaccinationRecordEntity,
            vaccine_lots::{InsertVaccineLotEntity, VaccineLotEntity},
            vaccines::VaccineEntity,
        },
        repositories::{
            appointment_slots::AppointmentSlotRepository,
            appointments::{AppointmentRepository, BookingCodeTaken},
            family_members::FamilyMemberRepository, payments::PaymentRepository,
            screenings::ScreeningRepository, vaccination_records::VaccinationRecordRepository,
            vaccine_lots::VaccineLotRepository, vaccines::VaccineRepository,
        },
        value_objects::{
            appointments::{
                DeleteAppointmentCommand, DeleteAppointmentOutcome, SlotMoveCommand,
                StatusChangeCommand,
            },
            enums::{appointment_statuses::AppointmentStatus, payment_statuses::PaymentStatus},
            patients::{PATIENT_GUEST, PATIENT_REGISTERED, Patient},
            payments::GatewayCallback,
            screenings::ScreeningDecisionCommand,
            slots::SlotCursor,
            vaccinations::{RecordVaccinationCommand, RecordVaccinationOutcome},
        },
    },
    notifications::{AppointmentEvent, AppointmentEventKind, AppointmentNotifier},
};
use uuid::Uuid;

use super::{
    appointment_state_machine::AppointmentStateMachine,
    booking_orchestrator::BookingOrchestrator,
    payment_reconciler::{PaymentGateway, PaymentReconciler},
    screening_gate::ScreeningGate,
    slot_ledger::SlotLedger,
    vaccination_recorder::VaccinationRecorder,
    vaccine_lot_ledger::VaccineLotLedger,
};

#[derive(Default)]
struct MemoryState {
    slots: HashMap<Uuid, AppointmentSlotEntity>,
    appointments: HashMap<Uuid, AppointmentEntity>,
    histories: Vec<AppointmentHistoryEntity>,
    /// Keyed by appointment id.
    payments: HashMap<Uuid, PaymentEntity>,
    /// Keyed by appointment id.
    screenings: HashMap<Uuid, ScreeningEntity>,
    /// Keyed by appointment id.
    records: HashMap<Uuid, VaccinationRecordEntity>,
    lots: HashMap<Uuid, VaccineLotEntity>,
    vaccines: HashMap<Uuid, VaccineEntity>,
    family_members: HashMap<Uuid, FamilyMemberEntity>,
    /// Upcoming inserts that behave as if their booking code were taken.
    booking_code_clashes: usize,
}

fn belongs_to(appointment: &AppointmentEntity, patient: &Patient) -> bool {
    match patient {
        Patient::Registered { user_id } => appointment.patient_user_id == Some(*user_id),
        Patient::FamilyMember { member_id } => appointment.family_member_id == Some(*member_id),
        Patient::Guest(guest) => {
            guest.phone.is_some()
                && appointment.patient_kind == PATIENT_GUEST
                && appointment.guest_phone == guest.phone
        }
    }
}

fn release_in(state: &mut MemoryState, slot_id: Uuid) {
    if let Some(slot) = state.slots.get(&slot_id) {
        let released = slot.released();
        state.slots.insert(slot_id, released);
    }
}

fn append_history(state: &mut MemoryState, history: InsertAppointmentHistoryEntity) {
    state.histories.push(AppointmentHistoryEntity {
        id: Uuid::new_v4(),
        appointment_id: history.appointment_id,
        old_status: history.old_status,
        new_status: history.new_status,
        changed_by: history.changed_by,
        changed_by_role: history.changed_by_role,
        reason: history.reason,
        changed_at: history.changed_at,
    });
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn seed_slot(&self, center_id: Uuid, max_capacity: i32, current_bookings: i32) -> AppointmentSlotEntity {
        let slot = AppointmentSlotEntity {
            id: Uuid::new_v4(),
            center_id,
            room_id: None,
            slot_date: Local::now().date_naive() + Duration::days(3),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            max_capacity,
            current_bookings,
            is_available: current_bookings < max_capacity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.lock().slots.insert(slot.id, slot.clone());
        slot
    }

    pub fn seed_vaccine(&self, price: Option<i64>, doses_required: i32) -> VaccineEntity {
        let vaccine = VaccineEntity {
            id: Uuid::new_v4(),
            name: "Influenza".to_string(),
            price,
            doses_required,
            days_between_doses: Some(28),
        };
        self.lock().vaccines.insert(vaccine.id, vaccine.clone());
        vaccine
    }

    pub fn seed_lot(&self, vaccine_id: Uuid, remaining_quantity: i32) -> VaccineLotEntity {
        let lot = VaccineLotEntity {
            id: Uuid::new_v4(),
            vaccine_id,
            lot_number: format!("LOT-{}", &Uuid::new_v4().simple().to_string()[..6]),
            quantity: remaining_quantity.max(1),
            remaining_quantity,
            manufacturing_date: None,
            expiry_date: Local::now().date_naive() + Duration::days(180),
            supplier: None,
            status: "AVAILABLE".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.lock().lots.insert(lot.id, lot.clone());
        lot
    }

    /// An appointment already somewhere along the clinic flow, bypassing booking.
    pub fn seed_appointment(
        &self,
        status: AppointmentStatus,
        center_id: Uuid,
        vaccine_id: Uuid,
    ) -> AppointmentEntity {
        let appointment = AppointmentEntity {
            id: Uuid::new_v4(),
            booking_code: format!("BK-SEED-{}", Uuid::new_v4().simple()),
            booked_by_user_id: None,
            patient_kind: PATIENT_REGISTERED.to_string(),
            patient_user_id: Some(Uuid::new_v4()),
            family_member_id: None,
            guest_full_name: None,
            guest_email: None,
            guest_phone: None,
            guest_date_of_birth: None,
            vaccine_id: Some(vaccine_id),
            center_id: Some(center_id),
            slot_id: None,
            room_id: None,
            appointment_date: Some(Local::now().date_naive()),
            appointment_time: NaiveTime::from_hms_opt(8, 0, 0),
            status: status.as_str().to_string(),
            dose_number: 1,
            queue_number: None,
            requires_consultation: false,
            cancellation_reason: None,
            notes: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.lock()
            .appointments
            .insert(appointment.id, appointment.clone());
        appointment
    }

    pub fn clash_next_booking_codes(&self, count: usize) {
        self.lock().booking_code_clashes = count;
    }

    pub fn screening(&self, appointment_id: Uuid) -> Option<ScreeningEntity> {
        self.lock().screenings.get(&appointment_id).cloned()
    }

    pub fn slot(&self, slot_id: Uuid) -> Option<AppointmentSlotEntity> {
        self.lock().slots.get(&slot_id).cloned()
    }

    pub fn lot(&self, lot_id: Uuid) -> Option<VaccineLotEntity> {
        self.lock().lots.get(&lot_id).cloned()
    }

    pub fn appointment(&self, appointment_id: Uuid) -> Option<AppointmentEntity> {
        self.lock().appointments.get(&appointment_id).cloned()
    }

    pub fn payment(&self, appointment_id: Uuid) -> Option<PaymentEntity> {
        self.lock().payments.get(&appointment_id).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn history_of(&self, appointment_id: Uuid) -> Vec<AppointmentHistoryEntity> {
        self.lock()
            .histories
            .iter()
            .filter(|history| history.appointment_id == appointment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AppointmentSlotRepository for MemoryStore {
    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        Ok(self.lock().slots.get(&slot_id).cloned())
    }

    async fn try_reserve(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        let mut state = self.lock();
        let Some(reserved) = state.slots.get(&slot_id).and_then(|slot| slot.reserved()) else {
            return Ok(None);
        };
        state.slots.insert(slot_id, reserved.clone());
        Ok(Some(reserved))
    }

    async fn release(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>> {
        let mut state = self.lock();
        release_in(&mut state, slot_id);
        Ok(state.slots.get(&slot_id).cloned())
    }

    async fn list_available_page(
        &self,
        center_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        after: Option<SlotCursor>,
        limit: i64,
    ) -> Result<Vec<AppointmentSlotEntity>> {
        let state = self.lock();
        let mut slots: Vec<_> = state
            .slots
            .values()
            .filter(|slot| slot.center_id == center_id)
            .filter(|slot| slot.slot_date >= from && slot.slot_date <= to)
            .filter(|slot| slot.has_capacity())
            .filter(|slot| match &after {
                Some(cursor) => {
                    (slot.slot_date, slot.start_time, slot.id)
                        > (cursor.slot_date, cursor.start_time, cursor.id)
                }
                None => true,
            })
            .cloned()
            .collect();
        slots.sort_by_key(|slot| (slot.slot_date, slot.start_time, slot.id));
        slots.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(slots)
    }

    async fn list_for_center_on(
        &self,
        center_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentSlotEntity>> {
        Ok(self
            .lock()
            .slots
            .values()
            .filter(|slot| slot.center_id == center_id && slot.slot_date == date)
            .cloned()
            .collect())
    }

    async fn create(&self, slot: InsertAppointmentSlotEntity) -> Result<AppointmentSlotEntity> {
        let created = AppointmentSlotEntity {
            id: Uuid::new_v4(),
            center_id: slot.center_id,
            room_id: slot.room_id,
            slot_date: slot.slot_date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            max_capacity: slot.max_capacity,
            current_bookings: slot.current_bookings,
            is_available: slot.is_available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.lock().slots.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl AppointmentRepository for MemoryStore {
    async fn find_by_id(&self, appointment_id: Uuid) -> Result<Option<AppointmentEntity>> {
        Ok(self.lock().appointments.get(&appointment_id).cloned())
    }

    async fn find_by_booking_code(
        &self,
        booking_code: String,
    ) -> Result<Option<AppointmentEntity>> {
        Ok(self
            .lock()
            .appointments
            .values()
            .find(|appointment| appointment.booking_code == booking_code)
            .cloned())
    }

    async fn create(
        &self,
        appointment: InsertAppointmentEntity,
        payment: Option<InsertPaymentEntity>,
        history: InsertAppointmentHistoryEntity,
    ) -> Result<(AppointmentEntity, Option<PaymentEntity>)> {
        let mut state = self.lock();
        if state.booking_code_clashes > 0 {
            state.booking_code_clashes -= 1;
            return Err(BookingCodeTaken(appointment.booking_code).into());
        }
        if state
            .appointments
            .values()
            .any(|existing| existing.booking_code == appointment.booking_code)
        {
            return Err(BookingCodeTaken(appointment.booking_code).into());
        }

        let now = Utc::now();
        let created = AppointmentEntity {
            id: appointment.id,
            booking_code: appointment.booking_code,
            booked_by_user_id: appointment.booked_by_user_id,
            patient_kind: appointment.patient_kind,
            patient_user_id: appointment.patient_user_id,
            family_member_id: appointment.family_member_id,
            guest_full_name: appointment.guest_full_name,
            guest_email: appointment.guest_email,
            guest_phone: appointment.guest_phone,
            guest_date_of_birth: appointment.guest_date_of_birth,
            vaccine_id: appointment.vaccine_id,
            center_id: appointment.center_id,
            slot_id: appointment.slot_id,
            room_id: appointment.room_id,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            status: appointment.status,
            dose_number: appointment.dose_number,
            queue_number: None,
            requires_consultation: appointment.requires_consultation,
            cancellation_reason: None,
            notes: appointment.notes,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let payment = payment.map(|payment| PaymentEntity {
            id: Uuid::new_v4(),
            appointment_id: payment.appointment_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            payment_status: payment.payment_status,
            transaction_id: None,
            invoice_number: None,
            cancellation_fee: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        });

        state.appointments.insert(created.id, created.clone());
        if let Some(payment) = &payment {
            state.payments.insert(created.id, payment.clone());
        }
        append_history(&mut state, history);
        Ok((created, payment))
    }

    async fn apply_status_change(
        &self,
        command: StatusChangeCommand,
    ) -> Result<Option<AppointmentEntity>> {
        let mut state = self.lock();
        let Some(current) = state
            .appointments
            .get(&command.appointment_id)
            .filter(|current| current.version == command.expected_version)
            .cloned()
        else {
            return Ok(None);
        };

        let mut updated = AppointmentEntity {
            status: command.changes.status,
            version: current.version + 1,
            updated_at: command.changes.updated_at,
            ..current
        };
        if let Some(reason) = command.changes.cancellation_reason {
            updated.cancellation_reason = Some(reason);
        }
        if let Some(queue) = command.assign_queue_on {
            let last = state
                .appointments
                .values()
                .filter(|appointment| appointment.appointment_date == Some(queue.date))
                .filter(|appointment| appointment.center_id == queue.center_id)
                .filter_map(|appointment| appointment.queue_number)
                .max();
            updated.queue_number = Some(last.unwrap_or(0) + 1);
        }

        state.appointments.insert(updated.id, updated.clone());
        if let Some(slot_id) = command.release_slot_id {
            release_in(&mut state, slot_id);
        }
        if let Some(fee) = command.cancellation_fee {
            if let Some(payment) = state.payments.get_mut(&updated.id) {
                payment.cancellation_fee = Some(fee);
            }
        }
        append_history(&mut state, command.history);
        Ok(Some(updated))
    }

    async fn move_to_slot(&self, command: SlotMoveCommand) -> Result<Option<AppointmentEntity>> {
        let mut state = self.lock();
        let Some(current) = state
            .appointments
            .get(&command.appointment_id)
            .filter(|current| current.version == command.expected_version)
            .cloned()
        else {
            return Ok(None);
        };

        let changes = command.changes;
        let moved = AppointmentEntity {
            status: changes.status,
            center_id: changes.center_id,
            slot_id: changes.slot_id,
            room_id: changes.room_id,
            appointment_date: changes.appointment_date,
            appointment_time: changes.appointment_time,
            version: current.version + 1,
            updated_at: changes.updated_at,
            ..current
        };
        state.appointments.insert(moved.id, moved.clone());
        if let Some(slot_id) = command.release_slot_id {
            release_in(&mut state, slot_id);
        }
        append_history(&mut state, command.history);
        Ok(Some(moved))
    }

    async fn delete_cascade(
        &self,
        command: DeleteAppointmentCommand,
    ) -> Result<DeleteAppointmentOutcome> {
        let mut state = self.lock();
        let appointment_id = command.appointment_id;
        let Some(locked) = state.appointments.get(&appointment_id).cloned() else {
            return Ok(DeleteAppointmentOutcome::Missing);
        };
        if !command.removable_statuses.contains(&locked.status) {
            return Ok(DeleteAppointmentOutcome::StatusChanged(locked.status));
        }
        if command.keep_when_paid
            && state
                .payments
                .get(&appointment_id)
                .is_some_and(|payment| payment.payment_status == PaymentStatus::Paid.as_str())
        {
            return Ok(DeleteAppointmentOutcome::PaymentSettled);
        }

        if locked.status != AppointmentStatus::Cancelled.as_str() {
            if let Some(slot_id) = locked.slot_id {
                release_in(&mut state, slot_id);
            }
        }
        state.appointments.remove(&appointment_id);
        state.payments.remove(&appointment_id);
        state.screenings.remove(&appointment_id);
        state.records.remove(&appointment_id);
        state
            .histories
            .retain(|history| history.appointment_id != appointment_id);
        Ok(DeleteAppointmentOutcome::Deleted(locked))
    }

    async fn list_history(&self, appointment_id: Uuid) -> Result<Vec<AppointmentHistoryEntity>> {
        Ok(self.history_of(appointment_id))
    }

    async fn count_active_on_date(&self, patient: Patient, date: NaiveDate) -> Result<i64> {
        let count = self
            .lock()
            .appointments
            .values()
            .filter(|appointment| belongs_to(appointment, &patient))
            .filter(|appointment| appointment.appointment_date == Some(date))
            .filter(|appointment| appointment.status != AppointmentStatus::Cancelled.as_str())
            .count();
        Ok(i64::try_from(count)?)
    }

    async fn max_booked_dose(
        &self,
        patient: Patient,
        vaccine_id: Uuid,
        statuses: Vec<String>,
    ) -> Result<i32> {
        Ok(self
            .lock()
            .appointments
            .values()
            .filter(|appointment| belongs_to(appointment, &patient))
            .filter(|appointment| appointment.vaccine_id == Some(vaccine_id))
            .filter(|appointment| statuses.contains(&appointment.status))
            .map(|appointment| appointment.dose_number)
            .max()
            .unwrap_or(0))
    }

    async fn list_scheduled_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        statuses: Vec<String>,
    ) -> Result<Vec<AppointmentEntity>> {
        Ok(self
            .lock()
            .appointments
            .values()
            .filter(|appointment| statuses.contains(&appointment.status))
            .filter(|appointment| {
                appointment
                    .scheduled_at()
                    .is_some_and(|at| at >= from && at < to)
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn find_by_appointment_id(&self, appointment_id: Uuid) -> Result<Option<PaymentEntity>> {
        Ok(self.payment(appointment_id))
    }

    async fn settle(
        &self,
        payment_id: Uuid,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>> {
        let mut state = self.lock();
        let Some(payment) = state
            .payments
            .values_mut()
            .find(|payment| payment.id == payment_id)
            .filter(|payment| payment.payment_status == PaymentStatus::Pending.as_str())
        else {
            return Ok(None);
        };
        payment.payment_status = PaymentStatus::Paid.as_str().to_string();
        payment.transaction_id = Some(settlement.transaction_id);
        payment.invoice_number = Some(settlement.invoice_number);
        payment.paid_at = Some(settlement.paid_at);
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn mark_failed(
        &self,
        payment_id: Uuid,
        transaction_id: Option<String>,
    ) -> Result<Option<PaymentEntity>> {
        let mut state = self.lock();
        let Some(payment) = state
            .payments
            .values_mut()
            .find(|payment| payment.id == payment_id)
            .filter(|payment| payment.payment_status == PaymentStatus::Pending.as_str())
        else {
            return Ok(None);
        };
        payment.payment_status = PaymentStatus::Failed.as_str().to_string();
        payment.transaction_id = transaction_id;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }
}

#[async_trait]
impl ScreeningRepository for MemoryStore {
    async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<ScreeningEntity>> {
        Ok(self.lock().screenings.get(&appointment_id).cloned())
    }

    async fn record_decision(
        &self,
        command: ScreeningDecisionCommand,
    ) -> Result<Option<(ScreeningEntity, AppointmentEntity)>> {
        let mut state = self.lock();
        let screening = command.screening;
        let Some(current) = state
            .appointments
            .get(&screening.appointment_id)
            .filter(|current| current.version == command.expected_version)
            .cloned()
        else {
            return Ok(None);
        };

        let appointment = AppointmentEntity {
            status: command.final_status,
            vaccine_id: command.switch_vaccine_to.or(current.vaccine_id),
            version: current.version + 1,
            updated_at: Utc::now(),
            ..current
        };
        let id = state
            .screenings
            .get(&screening.appointment_id)
            .map(|existing| existing.id)
            .unwrap_or_else(Uuid::new_v4);
        let stored = ScreeningEntity {
            id,
            appointment_id: screening.appointment_id,
            doctor_id: screening.doctor_id,
            body_temperature: screening.body_temperature,
            blood_pressure: screening.blood_pressure,
            heart_rate: screening.heart_rate,
            screening_result: screening.screening_result,
            rejection_reason: screening.rejection_reason,
            notes: screening.notes,
            screened_at: screening.screened_at,
        };

        state.appointments.insert(appointment.id, appointment.clone());
        state.screenings.insert(stored.appointment_id, stored.clone());
        for history in command.histories {
            append_history(&mut state, history);
        }
        Ok(Some((stored, appointment)))
    }
}

#[async_trait]
impl VaccinationRecordRepository for MemoryStore {
    async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VaccinationRecordEntity>> {
        Ok(self.lock().records.get(&appointment_id).cloned())
    }

    async fn record(&self, command: RecordVaccinationCommand) -> Result<RecordVaccinationOutcome> {
        let mut state = self.lock();
        let insert = command.record;

        let Some(lot) = state
            .lots
            .get(&insert.vaccine_lot_id)
            .and_then(|lot| lot.consumed(command.today))
        else {
            return Ok(RecordVaccinationOutcome::LotUnavailable);
        };
        if state.records.contains_key(&insert.appointment_id) {
            return Ok(RecordVaccinationOutcome::DuplicateRecord);
        }
        if state
            .records
            .values()
            .any(|record| record.certificate_number == insert.certificate_number)
        {
            return Ok(RecordVaccinationOutcome::CertificateTaken);
        }
        let Some(current) = state
            .appointments
            .get(&insert.appointment_id)
            .filter(|current| current.version == command.expected_version)
            .cloned()
        else {
            return Ok(RecordVaccinationOutcome::StaleAppointment);
        };

        let record = VaccinationRecordEntity {
            id: insert.id,
            appointment_id: insert.appointment_id,
            vaccine_id: insert.vaccine_id,
            vaccine_lot_id: insert.vaccine_lot_id,
            nurse_id: insert.nurse_id,
            injection_date: insert.injection_date,
            injection_time: insert.injection_time,
            injection_site: insert.injection_site,
            dose_number: insert.dose_number,
            dose_amount: insert.dose_amount,
            batch_number: insert.batch_number,
            certificate_number: insert.certificate_number,
            next_dose_date: insert.next_dose_date,
            notes: insert.notes,
            created_at: Utc::now(),
        };
        let appointment = AppointmentEntity {
            status: command.final_status,
            version: current.version + 1,
            updated_at: Utc::now(),
            ..current
        };

        state.lots.insert(lot.id, lot.clone());
        state.records.insert(record.appointment_id, record.clone());
        state.appointments.insert(appointment.id, appointment.clone());
        for history in command.histories {
            append_history(&mut state, history);
        }

        Ok(RecordVaccinationOutcome::Recorded {
            record,
            lot,
            appointment,
        })
    }

    async fn max_completed_dose(&self, patient: Patient, vaccine_id: Uuid) -> Result<i32> {
        let state = self.lock();
        Ok(state
            .records
            .values()
            .filter(|record| record.vaccine_id == vaccine_id)
            .filter(|record| {
                state
                    .appointments
                    .get(&record.appointment_id)
                    .is_some_and(|appointment| belongs_to(appointment, &patient))
            })
            .map(|record| record.dose_number)
            .max()
            .unwrap_or(0))
    }
}

#[async_trait]
impl VaccineLotRepository for MemoryStore {
    async fn find_by_id(&self, lot_id: Uuid) -> Result<Option<VaccineLotEntity>> {
        Ok(self.lot(lot_id))
    }

    async fn find_by_lot_number(&self, lot_number: String) -> Result<Option<VaccineLotEntity>> {
        Ok(self
            .lock()
            .lots
            .values()
            .find(|lot| lot.lot_number == lot_number)
            .cloned())
    }

    async fn create(&self, lot: InsertVaccineLotEntity) -> Result<VaccineLotEntity> {
        let created = VaccineLotEntity {
            id: Uuid::new_v4(),
            vaccine_id: lot.vaccine_id,
            lot_number: lot.lot_number,
            quantity: lot.quantity,
            remaining_quantity: lot.remaining_quantity,
            manufacturing_date: lot.manufacturing_date,
            expiry_date: lot.expiry_date,
            supplier: lot.supplier,
            status: lot.status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.lock().lots.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_all(&self) -> Result<Vec<VaccineLotEntity>> {
        let mut lots: Vec<_> = self.lock().lots.values().cloned().collect();
        lots.sort_by_key(|lot| lot.expiry_date);
        Ok(lots)
    }

    async fn update_status(&self, lot_id: Uuid, status: String) -> Result<()> {
        if let Some(lot) = self.lock().lots.get_mut(&lot_id) {
            lot.status = status;
        }
        Ok(())
    }
}

#[async_trait]
impl VaccineRepository for MemoryStore {
    async fn find_by_id(&self, vaccine_id: Uuid) -> Result<Option<VaccineEntity>> {
        Ok(self.lock().vaccines.get(&vaccine_id).cloned())
    }
}

#[async_trait]
impl FamilyMemberRepository for MemoryStore {
    async fn find_by_id(&self, member_id: Uuid) -> Result<Option<FamilyMemberEntity>> {
        Ok(self.lock().family_members.get(&member_id).cloned())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<AppointmentEvent>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<AppointmentEventKind> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.kind)
            .collect()
    }
}

impl AppointmentNotifier for RecordingNotifier {
    fn publish(&self, event: AppointmentEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Gateway double reading `order`, `code`, `txn` and `sig` from the query.
pub(crate) struct StubGateway;

impl StubGateway {
    pub fn callback_query(order_ref: &str, code: &str, transaction_id: &str) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("order", order_ref)
            .append_pair("code", code)
            .append_pair("txn", transaction_id)
            .append_pair("sig", "ok")
            .finish()
    }
}

impl PaymentGateway for StubGateway {
    fn create_payment_url(
        &self,
        amount: i64,
        order_ref: &str,
        _order_info: &str,
        _client_ip: &str,
        _now: DateTime<Utc>,
    ) -> Result<String> {
        Ok(format!("https://pay.test/checkout?ref={order_ref}&amount={amount}"))
    }

    fn verify_callback(&self, raw_query: &str) -> Result<GatewayCallback> {
        let params: HashMap<String, String> = url::form_urlencoded::parse(raw_query.as_bytes())
            .into_owned()
            .collect();
        Ok(GatewayCallback {
            order_ref: params.get("order").cloned(),
            response_code: params.get("code").cloned(),
            transaction_id: params.get("txn").cloned(),
            signature_valid: params.get("sig").is_some_and(|sig| sig == "ok"),
        })
    }
}

/// Every use case wired to one shared [`MemoryStore`].
pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub slot_ledger: Arc<SlotLedger>,
    pub lot_ledger: Arc<VaccineLotLedger>,
    pub state_machine: Arc<AppointmentStateMachine>,
    pub reconciler: Arc<PaymentReconciler>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub screening_gate: Arc<ScreeningGate>,
    pub recorder: Arc<VaccinationRecorder>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let slot_ledger = Arc::new(SlotLedger::new(store.clone()));
        let lot_ledger = Arc::new(VaccineLotLedger::new(store.clone(), store.clone()));
        let state_machine = Arc::new(AppointmentStateMachine::new(
            store.clone(),
            store.clone(),
            notifier.clone(),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            store.clone(),
            Arc::new(StubGateway),
            Arc::clone(&state_machine),
            notifier.clone(),
        ));
        let orchestrator = Arc::new(BookingOrchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::clone(&slot_ledger),
            Arc::clone(&state_machine),
            Arc::clone(&reconciler),
            notifier.clone(),
        ));
        let screening_gate = Arc::new(ScreeningGate::new(
            store.clone(),
            store.clone(),
            Arc::clone(&state_machine),
            notifier.clone(),
        ));
        let recorder = Arc::new(VaccinationRecorder::new(
            store.clone(),
            store.clone(),
            Arc::clone(&lot_ledger),
            Arc::clone(&state_machine),
            notifier.clone(),
        ));

        Self {
            store,
            notifier,
            slot_ledger,
            lot_ledger,
            state_machine,
            reconciler,
            orchestrator,
            screening_gate,
            recorder,
        }
    }
}
