use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
    },
    infra::db::postgres::schema::payments,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub invoice_number: Option<String>,
    pub cancellation_fee: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentEntity {
    pub fn status(&self) -> Result<PaymentStatus> {
        PaymentStatus::from_str(&self.payment_status).ok_or_else(|| {
            anyhow!(
                "payment {} has unknown status {}",
                self.id,
                self.payment_status
            )
        })
    }

    pub fn method(&self) -> Result<PaymentMethod> {
        PaymentMethod::from_str(&self.payment_method).ok_or_else(|| {
            anyhow!(
                "payment {} has unknown method {}",
                self.id,
                self.payment_method
            )
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub appointment_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub payment_status: String,
}

/// Settlement written by a successful `markPaid`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSettlement {
    pub transaction_id: String,
    pub invoice_number: String,
    pub paid_at: DateTime<Utc>,
}
