use std::sync::Arc;

use anyhow::Result as AnyResult;
use chrono::{DateTime, Local, Utc};
use crates::{
    domain::{
        entities::{
            appointments::AppointmentEntity,
            payments::{InsertPaymentEntity, PaymentEntity, PaymentSettlement},
            vaccines::VaccineEntity,
        },
        repositories::{appointments::AppointmentRepository, payments::PaymentRepository},
        value_objects::{
            actors::ActorContext,
            enums::{
                appointment_statuses::AppointmentStatus, payment_methods::PaymentMethod,
                payment_statuses::PaymentStatus, roles::Role,
            },
            appointments::{DeleteAppointmentCommand, DeleteAppointmentOutcome},
            payments::{GatewayCallback, GatewayOutcome},
        },
    },
    notifications::{AppointmentEventKind, AppointmentNotifier},
    payments::vnpay_client::VnPayClient,
};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    appointment_state_machine::{
        AppointmentStateMachine, TransitionOptions, appointment_event, ensure_access,
    },
    codes,
    errors::{BookingError, UseCaseResult, storage_failure},
};

#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    fn create_payment_url(
        &self,
        amount: i64,
        order_ref: &str,
        order_info: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> AnyResult<String>;

    fn verify_callback(&self, raw_query: &str) -> AnyResult<GatewayCallback>;
}

impl PaymentGateway for VnPayClient {
    fn create_payment_url(
        &self,
        amount: i64,
        order_ref: &str,
        order_info: &str,
        client_ip: &str,
        now: DateTime<Utc>,
    ) -> AnyResult<String> {
        self.create_payment_url(amount, order_ref, order_info, client_ip, now)
    }

    fn verify_callback(&self, raw_query: &str) -> AnyResult<GatewayCallback> {
        self.verify_callback(raw_query)
    }
}

/// Statuses in which an unpaid gateway booking is still removed.
const REMOVABLE_ON_FAILURE: [AppointmentStatus; 2] =
    [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    Deleted,
    AlreadyGone,
    /// The cascade failed; the payment was flagged FAILED for an operator.
    FlaggedFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Paid,
    AlreadyPaid,
    AlreadyResolved,
    Removed(GatewayOutcome),
    FlaggedFailed,
    /// Money was captured after the appointment was cancelled.
    RefundRequired,
}

impl CallbackOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, CallbackOutcome::Paid | CallbackOutcome::AlreadyPaid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub booking_code: String,
    pub outcome: CallbackOutcome,
}

/// Refund share kept when a paid appointment is cancelled `hours_before` its start.
pub fn cancellation_fee(amount: i64, hours_before: i64) -> i64 {
    let percent = match hours_before {
        h if h >= 24 => 0,
        h if h >= 12 => 20,
        h if h >= 6 => 50,
        _ => 100,
    };
    amount * percent / 100
}

pub struct PaymentReconciler {
    payment_repository: Arc<dyn PaymentRepository + Send + Sync>,
    appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    state_machine: Arc<AppointmentStateMachine>,
    notifier: Arc<dyn AppointmentNotifier>,
}

impl PaymentReconciler {
    pub fn new(
        payment_repository: Arc<dyn PaymentRepository + Send + Sync>,
        appointment_repository: Arc<dyn AppointmentRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway>,
        state_machine: Arc<AppointmentStateMachine>,
        notifier: Arc<dyn AppointmentNotifier>,
    ) -> Self {
        Self {
            payment_repository,
            appointment_repository,
            gateway,
            state_machine,
            notifier,
        }
    }

    /// Price to charge; `None` when the vaccine is free or unpriced.
    pub fn quote(vaccine: &VaccineEntity) -> Option<i64> {
        vaccine.price.filter(|price| *price > 0)
    }

    pub fn new_payment(
        appointment_id: Uuid,
        amount: i64,
        method: PaymentMethod,
    ) -> InsertPaymentEntity {
        InsertPaymentEntity {
            appointment_id,
            amount,
            payment_method: method.as_str().to_string(),
            payment_status: PaymentStatus::Pending.as_str().to_string(),
        }
    }

    pub async fn payment_for(&self, appointment_id: Uuid) -> UseCaseResult<Option<PaymentEntity>> {
        self.payment_repository
            .find_by_appointment_id(appointment_id)
            .await
            .map_err(storage_failure("payments: load payment"))
    }

    async fn load_appointment(&self, appointment_id: Uuid) -> UseCaseResult<AppointmentEntity> {
        self.appointment_repository
            .find_by_id(appointment_id)
            .await
            .map_err(storage_failure("payments: load appointment"))?
            .ok_or(BookingError::NotFound("appointment"))
    }

    pub async fn payment_status(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<PaymentEntity> {
        let appointment = self.load_appointment(appointment_id).await?;
        ensure_access(actor, &appointment)?;
        self.payment_for(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("payment"))
    }

    /// PENDING -> PAID. Any other current status is rejected and left untouched.
    pub async fn mark_paid(
        &self,
        payment: &PaymentEntity,
        transaction_id: String,
    ) -> UseCaseResult<PaymentEntity> {
        let status = payment.status()?;
        if status != PaymentStatus::Pending {
            warn!(
                payment_id = %payment.id,
                status = %status,
                "payments: settle rejected, payment not pending"
            );
            return Err(BookingError::PaymentAlreadySettled);
        }

        let now = Local::now();
        let settlement = PaymentSettlement {
            transaction_id,
            invoice_number: payment
                .invoice_number
                .clone()
                .unwrap_or_else(|| codes::invoice_number(now)),
            paid_at: now.with_timezone(&Utc),
        };

        let settled = self
            .payment_repository
            .settle(payment.id, settlement)
            .await
            .map_err(storage_failure("payments: settle payment"))?
            .ok_or_else(|| {
                warn!(payment_id = %payment.id, "payments: payment settled concurrently");
                BookingError::PaymentAlreadySettled
            })?;

        info!(
            payment_id = %settled.id,
            appointment_id = %settled.appointment_id,
            invoice_number = ?settled.invoice_number,
            "payments: payment settled"
        );
        Ok(settled)
    }

    pub async fn mark_paid_cash(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
    ) -> UseCaseResult<PaymentEntity> {
        if !matches!(actor.role, Role::Receptionist | Role::Admin) {
            return Err(BookingError::Forbidden(
                "only reception settles cash payments".to_string(),
            ));
        }
        let appointment = self.load_appointment(appointment_id).await?;
        if !actor.works_at(appointment.center_id) {
            return Err(BookingError::CenterMismatch);
        }

        let payment = self
            .payment_for(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("payment"))?;
        if payment.method()? != PaymentMethod::Cash {
            return Err(BookingError::Validation(
                "payment is not a cash payment".to_string(),
            ));
        }

        self.mark_paid(&payment, codes::cash_transaction_id(&appointment.booking_code))
            .await
    }

    pub async fn create_payment_url(
        &self,
        actor: &ActorContext,
        appointment_id: Uuid,
        client_ip: &str,
    ) -> UseCaseResult<String> {
        let appointment = self.load_appointment(appointment_id).await?;
        ensure_access(actor, &appointment)?;
        let payment = self
            .payment_for(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("payment"))?;
        self.payment_url_for(&appointment, &payment, client_ip)
    }

    pub fn payment_url_for(
        &self,
        appointment: &AppointmentEntity,
        payment: &PaymentEntity,
        client_ip: &str,
    ) -> UseCaseResult<String> {
        if !payment.method()?.is_gateway() {
            return Err(BookingError::Validation(
                "payment is not settled through the gateway".to_string(),
            ));
        }
        if payment.status()? != PaymentStatus::Pending {
            return Err(BookingError::PaymentAlreadySettled);
        }

        let order_info = format!("Payment for appointment {}", appointment.booking_code);
        let url = self
            .gateway
            .create_payment_url(
                payment.amount,
                &appointment.booking_code,
                &order_info,
                client_ip,
                Utc::now(),
            )
            .map_err(|err| {
                error!(gateway_error = ?err, "payments: failed to build payment url");
                BookingError::Internal(err)
            })?;

        info!(
            appointment_id = %appointment.id,
            booking_code = %appointment.booking_code,
            "payments: payment url issued"
        );
        Ok(url)
    }

    /// Reconciles one gateway return. Safe to call repeatedly for the same order.
    pub async fn handle_gateway_callback(&self, raw_query: &str) -> UseCaseResult<CallbackResult> {
        let callback = self.gateway.verify_callback(raw_query).map_err(|err| {
            error!(gateway_error = ?err, "payments: failed to read gateway callback");
            BookingError::Internal(err)
        })?;

        let Some(booking_code) = callback
            .order_ref
            .clone()
            .map(|order_ref| order_ref.trim().to_string())
            .filter(|order_ref| !order_ref.is_empty())
        else {
            warn!("payments: gateway callback without order reference");
            if !callback.signature_valid {
                return Err(BookingError::SignatureVerification);
            }
            return Err(BookingError::Validation(
                "callback carries no order reference".to_string(),
            ));
        };

        let appointment = self
            .appointment_repository
            .find_by_booking_code(booking_code.clone())
            .await
            .map_err(storage_failure("payments: load appointment by booking code"))?;
        let Some(appointment) = appointment else {
            info!(%booking_code, "payments: callback for removed appointment ignored");
            return Ok(CallbackResult {
                booking_code,
                outcome: CallbackOutcome::AlreadyResolved,
            });
        };

        let payment = self.payment_for(appointment.id).await?;
        if let Some(payment) = &payment {
            if payment.status()? == PaymentStatus::Paid {
                info!(%booking_code, "payments: duplicate callback for paid order ignored");
                return Ok(CallbackResult {
                    booking_code,
                    outcome: CallbackOutcome::AlreadyPaid,
                });
            }
        }

        if !callback.signature_valid {
            warn!(%booking_code, "payments: callback signature invalid, removing booking");
            self.delete_appointment_when_payment_failed(appointment.id, callback.transaction_id)
                .await?;
            return Err(BookingError::SignatureVerification);
        }

        let outcome = GatewayOutcome::from_response_code(callback.response_code.as_deref());
        info!(
            %booking_code,
            response_code = ?callback.response_code,
            outcome = ?outcome,
            "payments: gateway callback received"
        );

        if outcome != GatewayOutcome::Success {
            let deletion = self
                .delete_appointment_when_payment_failed(appointment.id, callback.transaction_id)
                .await?;
            let outcome = match deletion {
                DeletionOutcome::Deleted => CallbackOutcome::Removed(outcome),
                DeletionOutcome::AlreadyGone => CallbackOutcome::AlreadyResolved,
                DeletionOutcome::FlaggedFailed => CallbackOutcome::FlaggedFailed,
            };
            return Ok(CallbackResult {
                booking_code,
                outcome,
            });
        }

        let payment = payment.ok_or(BookingError::NotFound("payment"))?;
        let transaction_id = callback
            .transaction_id
            .clone()
            .unwrap_or_else(|| booking_code.clone());
        let status = appointment.current_status()?;
        match self.mark_paid(&payment, transaction_id).await {
            Ok(_) => {}
            Err(BookingError::PaymentAlreadySettled) => {
                let outcome = match self.payment_for(appointment.id).await? {
                    Some(_) => CallbackOutcome::AlreadyPaid,
                    None => CallbackOutcome::AlreadyResolved,
                };
                return Ok(CallbackResult {
                    booking_code,
                    outcome,
                });
            }
            Err(err) => return Err(err),
        }

        if status == AppointmentStatus::Cancelled {
            return Ok(self.refund_required(booking_code, &appointment, status));
        }

        if status == AppointmentStatus::Pending {
            match self
                .state_machine
                .transition(
                    &appointment,
                    AppointmentStatus::Confirmed,
                    &ActorContext::system(),
                    TransitionOptions::because("Payment settled"),
                )
                .await
            {
                Ok(_) => {}
                Err(BookingError::Conflict(_)) => {
                    let current = self.load_appointment(appointment.id).await?;
                    let current_status = current.current_status()?;
                    if current_status == AppointmentStatus::Cancelled {
                        return Ok(self.refund_required(booking_code, &current, current_status));
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Ok(CallbackResult {
            booking_code,
            outcome: CallbackOutcome::Paid,
        })
    }

    /// The gateway captured money for a booking that was cancelled meanwhile.
    fn refund_required(
        &self,
        booking_code: String,
        appointment: &AppointmentEntity,
        status: AppointmentStatus,
    ) -> CallbackResult {
        error!(
            appointment_id = %appointment.id,
            %booking_code,
            status = %status,
            "payments: payment settled for a cancelled appointment, refund required"
        );
        CallbackResult {
            booking_code,
            outcome: CallbackOutcome::RefundRequired,
        }
    }

    /// Compensating removal of a booking whose gateway payment did not go through.
    /// The guards are re-checked against the locked row inside the delete transaction.
    pub async fn delete_appointment_when_payment_failed(
        &self,
        appointment_id: Uuid,
        transaction_id: Option<String>,
    ) -> UseCaseResult<DeletionOutcome> {
        let appointment = self
            .appointment_repository
            .find_by_id(appointment_id)
            .await
            .map_err(storage_failure("payments: load appointment"))?;
        let Some(appointment) = appointment else {
            return Ok(DeletionOutcome::AlreadyGone);
        };

        let payment = self
            .payment_for(appointment_id)
            .await?
            .ok_or(BookingError::NotFound("payment"))?;
        if !payment.method()?.is_gateway() {
            return Err(BookingError::Validation(
                "only gateway bookings are removed on payment failure".to_string(),
            ));
        }
        if payment.status()? == PaymentStatus::Paid {
            return Err(BookingError::PaymentAlreadySettled);
        }
        let status = appointment.current_status()?;
        if !REMOVABLE_ON_FAILURE.contains(&status) {
            return Err(BookingError::Validation(format!(
                "appointment is {status} and can no longer be removed"
            )));
        }

        let command = DeleteAppointmentCommand {
            appointment_id,
            removable_statuses: REMOVABLE_ON_FAILURE
                .iter()
                .map(|status| status.as_str().to_string())
                .collect(),
            keep_when_paid: true,
        };
        match self.appointment_repository.delete_cascade(command).await {
            Ok(DeleteAppointmentOutcome::Deleted(removed)) => {
                info!(
                    %appointment_id,
                    booking_code = %removed.booking_code,
                    "payments: booking removed after failed payment"
                );
                self.notifier.publish(appointment_event(
                    AppointmentEventKind::Cancelled,
                    &removed,
                    Some("Payment was not completed".to_string()),
                ));
                Ok(DeletionOutcome::Deleted)
            }
            Ok(DeleteAppointmentOutcome::Missing) => Ok(DeletionOutcome::AlreadyGone),
            Ok(DeleteAppointmentOutcome::PaymentSettled) => {
                warn!(%appointment_id, "payments: payment settled before removal, booking kept");
                Err(BookingError::PaymentAlreadySettled)
            }
            Ok(DeleteAppointmentOutcome::StatusChanged(status)) => {
                warn!(%appointment_id, %status, "payments: appointment moved on before removal");
                Err(BookingError::Validation(format!(
                    "appointment is {status} and can no longer be removed"
                )))
            }
            Err(err) => {
                error!(
                    %appointment_id,
                    db_error = ?err,
                    "payments: compensating delete failed, flagging payment FAILED for reconciliation"
                );
                match self
                    .payment_repository
                    .mark_failed(payment.id, transaction_id)
                    .await
                {
                    Ok(_) => Ok(DeletionOutcome::FlaggedFailed),
                    Err(flag_err) => {
                        error!(
                            %appointment_id,
                            db_error = ?flag_err,
                            "payments: could not flag payment FAILED"
                        );
                        Err(BookingError::Internal(err))
                    }
                }
            }
        }
    }
}
