use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    appointment_histories::InsertAppointmentHistoryEntity,
    appointments::AppointmentEntity,
    vaccination_records::{InsertVaccinationRecordEntity, VaccinationRecordEntity},
    vaccine_lots::VaccineLotEntity,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectionDetails {
    pub injection_date: Option<NaiveDate>,
    pub injection_time: Option<NaiveTime>,
    pub injection_site: Option<String>,
    pub dose_amount: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordVaccinationModel {
    pub appointment_id: Uuid,
    pub vaccine_lot_id: Uuid,
    #[serde(flatten)]
    pub details: InjectionDetails,
}

/// Everything the record transaction writes: lot decrement, record row,
/// appointment status and history.
#[derive(Debug, Clone)]
pub struct RecordVaccinationCommand {
    pub record: InsertVaccinationRecordEntity,
    pub today: NaiveDate,
    pub expected_version: i32,
    pub final_status: String,
    pub histories: Vec<InsertAppointmentHistoryEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordVaccinationOutcome {
    Recorded {
        record: VaccinationRecordEntity,
        lot: VaccineLotEntity,
        appointment: AppointmentEntity,
    },
    LotUnavailable,
    DuplicateRecord,
    /// The generated certificate number is already in use; nothing was written.
    CertificateTaken,
    StaleAppointment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLotModel {
    pub vaccine_id: Uuid,
    pub lot_number: String,
    pub quantity: i32,
    pub manufacturing_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub supplier: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VaccinationRecordDto {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub vaccine_id: Uuid,
    pub vaccine_lot_id: Uuid,
    pub nurse_id: Option<Uuid>,
    pub injection_date: NaiveDate,
    pub injection_time: NaiveTime,
    pub injection_site: Option<String>,
    pub dose_number: i32,
    pub dose_amount: Option<f64>,
    pub batch_number: String,
    pub certificate_number: String,
    pub next_dose_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<VaccinationRecordEntity> for VaccinationRecordDto {
    fn from(value: VaccinationRecordEntity) -> Self {
        Self {
            id: value.id,
            appointment_id: value.appointment_id,
            vaccine_id: value.vaccine_id,
            vaccine_lot_id: value.vaccine_lot_id,
            nurse_id: value.nurse_id,
            injection_date: value.injection_date,
            injection_time: value.injection_time,
            injection_site: value.injection_site,
            dose_number: value.dose_number,
            dose_amount: value.dose_amount,
            batch_number: value.batch_number,
            certificate_number: value.certificate_number,
            next_dose_date: value.next_dose_date,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VaccineLotDto {
    pub id: Uuid,
    pub vaccine_id: Uuid,
    pub lot_number: String,
    pub quantity: i32,
    pub remaining_quantity: i32,
    pub expiry_date: NaiveDate,
    pub status: String,
}

impl From<VaccineLotEntity> for VaccineLotDto {
    fn from(value: VaccineLotEntity) -> Self {
        Self {
            id: value.id,
            vaccine_id: value.vaccine_id,
            lot_number: value.lot_number,
            quantity: value.quantity,
            remaining_quantity: value.remaining_quantity,
            expiry_date: value.expiry_date,
            status: value.status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LotWarningKind {
    ExpiringSoon,
    LowStock,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LotWarningDto {
    pub kind: LotWarningKind,
    pub lot: VaccineLotDto,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct LotSweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub depleted: usize,
    pub restored: usize,
}
