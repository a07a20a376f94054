use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::{appointments::AppointmentEntity, screenings::ScreeningEntity},
    value_objects::screenings::ScreeningDecisionCommand,
};

#[async_trait]
#[automock]
pub trait ScreeningRepository {
    async fn find_by_appointment_id(&self, appointment_id: Uuid)
    -> Result<Option<ScreeningEntity>>;

    /// Applies the decision in one transaction. Returns `None`, with nothing
    /// written, when `expected_version` no longer matches.
    async fn record_decision(
        &self,
        command: ScreeningDecisionCommand,
    ) -> Result<Option<(ScreeningEntity, AppointmentEntity)>>;
}
