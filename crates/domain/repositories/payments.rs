use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payments::{PaymentEntity, PaymentSettlement};

#[async_trait]
#[automock]
pub trait PaymentRepository {
    async fn find_by_appointment_id(&self, appointment_id: Uuid) -> Result<Option<PaymentEntity>>;

    /// PENDING -> PAID. `None` when the payment is no longer PENDING.
    async fn settle(
        &self,
        payment_id: Uuid,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>>;

    /// PENDING -> FAILED. `None` when the payment is no longer PENDING.
    async fn mark_failed(
        &self,
        payment_id: Uuid,
        transaction_id: Option<String>,
    ) -> Result<Option<PaymentEntity>>;
}
