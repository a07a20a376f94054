use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::vaccines::VaccineEntity;

#[async_trait]
#[automock]
pub trait VaccineRepository {
    async fn find_by_id(&self, vaccine_id: Uuid) -> Result<Option<VaccineEntity>>;
}
