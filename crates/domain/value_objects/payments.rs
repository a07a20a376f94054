use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::payments::PaymentEntity;

/// Inbound gateway redirect after the customer leaves the payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    pub order_ref: Option<String>,
    pub response_code: Option<String>,
    pub transaction_id: Option<String>,
    pub signature_valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Success,
    UserCancelled,
    Abandoned,
    Failed,
}

impl GatewayOutcome {
    pub const SUCCESS_CODE: &'static str = "00";
    pub const USER_CANCEL_CODE: &'static str = "24";

    pub fn from_response_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            None | Some("") => GatewayOutcome::Abandoned,
            Some(Self::SUCCESS_CODE) => GatewayOutcome::Success,
            Some(Self::USER_CANCEL_CODE) => GatewayOutcome::UserCancelled,
            Some(_) => GatewayOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentDto {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub amount: i64,
    pub payment_method: String,
    pub payment_status: String,
    pub transaction_id: Option<String>,
    pub invoice_number: Option<String>,
    pub cancellation_fee: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            appointment_id: value.appointment_id,
            amount: value.amount,
            payment_method: value.payment_method,
            payment_status: value.payment_status,
            transaction_id: value.transaction_id,
            invoice_number: value.invoice_number,
            cancellation_fee: value.cancellation_fee,
            paid_at: value.paid_at,
        }
    }
}
