use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payments::{PaymentEntity, PaymentSettlement},
        repositories::payments::PaymentRepository,
        value_objects::enums::payment_statuses::PaymentStatus,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payments},
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn find_by_appointment_id(&self, appointment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = payments::table
            .filter(payments::appointment_id.eq(appointment_id))
            .select(PaymentEntity::as_select())
            .first::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn settle(
        &self,
        payment_id: Uuid,
        settlement: PaymentSettlement,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::payment_status.eq(PaymentStatus::Pending.as_str()))
            .set((
                payments::payment_status.eq(PaymentStatus::Paid.as_str()),
                payments::transaction_id.eq(Some(settlement.transaction_id)),
                payments::invoice_number.eq(Some(settlement.invoice_number)),
                payments::paid_at.eq(Some(settlement.paid_at)),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }

    async fn mark_failed(
        &self,
        payment_id: Uuid,
        transaction_id: Option<String>,
    ) -> Result<Option<PaymentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment = update(payments::table)
            .filter(payments::id.eq(payment_id))
            .filter(payments::payment_status.eq(PaymentStatus::Pending.as_str()))
            .set((
                payments::payment_status.eq(PaymentStatus::Failed.as_str()),
                payments::transaction_id.eq(transaction_id),
                payments::updated_at.eq(Utc::now()),
            ))
            .returning(PaymentEntity::as_returning())
            .get_result::<PaymentEntity>(&mut conn)
            .optional()?;

        Ok(payment)
    }
}
