use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::vaccine_lots::{InsertVaccineLotEntity, VaccineLotEntity};

#[async_trait]
#[automock]
pub trait VaccineLotRepository {
    async fn find_by_id(&self, lot_id: Uuid) -> Result<Option<VaccineLotEntity>>;

    async fn find_by_lot_number(&self, lot_number: String) -> Result<Option<VaccineLotEntity>>;

    async fn create(&self, lot: InsertVaccineLotEntity) -> Result<VaccineLotEntity>;

    async fn list_all(&self) -> Result<Vec<VaccineLotEntity>>;

    async fn update_status(&self, lot_id: Uuid, status: String) -> Result<()>;
}
