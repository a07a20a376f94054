use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::appointment_slots::{AppointmentSlotEntity, InsertAppointmentSlotEntity},
    value_objects::slots::SlotCursor,
};

#[async_trait]
#[automock]
pub trait AppointmentSlotRepository {
    async fn find_by_id(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>>;

    /// Conditional increment; `None` when the slot is full, closed or missing.
    async fn try_reserve(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>>;

    /// Decrement floored at zero; `None` when the slot does not exist.
    async fn release(&self, slot_id: Uuid) -> Result<Option<AppointmentSlotEntity>>;

    async fn list_available_page(
        &self,
        center_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        after: Option<SlotCursor>,
        limit: i64,
    ) -> Result<Vec<AppointmentSlotEntity>>;

    async fn list_for_center_on(
        &self,
        center_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentSlotEntity>>;

    async fn create(&self, slot: InsertAppointmentSlotEntity) -> Result<AppointmentSlotEntity>;
}
