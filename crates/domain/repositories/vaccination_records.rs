use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::vaccination_records::VaccinationRecordEntity,
    value_objects::{
        patients::Patient,
        vaccinations::{RecordVaccinationCommand, RecordVaccinationOutcome},
    },
};

#[async_trait]
#[automock]
pub trait VaccinationRecordRepository {
    async fn find_by_appointment_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VaccinationRecordEntity>>;

    /// Lot decrement, record insert and appointment update commit together or not at all.
    async fn record(&self, command: RecordVaccinationCommand) -> Result<RecordVaccinationOutcome>;

    /// Highest dose already given to the patient for the vaccine, 0 if none.
    async fn max_completed_dose(&self, patient: Patient, vaccine_id: Uuid) -> Result<i32>;
}
