use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use crates::domain::value_objects::payments::{GatewayOutcome, PaymentDto};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::payment_reconciler::{CallbackOutcome, CallbackResult, PaymentReconciler},
};

use super::client_ip;

pub struct PaymentsState {
    pub reconciler: Arc<PaymentReconciler>,
    pub result_page_url: Url,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlDto {
    pub payment_url: String,
}

pub fn routes(state: PaymentsState) -> Router {
    Router::new()
        .route("/vnpay-return", get(vnpay_return))
        .route("/:appointment_id", get(status))
        .route("/:appointment_id/url", post(create_payment_url))
        .route("/:appointment_id/cash", post(mark_paid_cash))
        .with_state(Arc::new(state))
}

fn result_status(outcome: CallbackOutcome) -> &'static str {
    match outcome {
        CallbackOutcome::Paid | CallbackOutcome::AlreadyPaid => "success",
        CallbackOutcome::Removed(GatewayOutcome::UserCancelled)
        | CallbackOutcome::Removed(GatewayOutcome::Abandoned) => "cancelled",
        CallbackOutcome::AlreadyResolved => "resolved",
        CallbackOutcome::RefundRequired => "refund",
        CallbackOutcome::Removed(_) | CallbackOutcome::FlaggedFailed => "failed",
    }
}

/// Result page location carrying `status` and `bookingCode`.
pub fn result_redirect(result_page_url: &Url, result: &CallbackResult) -> String {
    let mut url = result_page_url.clone();
    url.query_pairs_mut()
        .append_pair("status", result_status(result.outcome))
        .append_pair("bookingCode", &result.booking_code);
    url.to_string()
}

pub async fn vnpay_return(
    State(state): State<Arc<PaymentsState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let raw_query = query.unwrap_or_default();
    match state.reconciler.handle_gateway_callback(&raw_query).await {
        Ok(result) => Redirect::to(&result_redirect(&state.result_page_url, &result)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn status(
    State(state): State<Arc<PaymentsState>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match state
        .reconciler
        .payment_status(&auth.actor, appointment_id)
        .await
    {
        Ok(payment) => (StatusCode::OK, Json(PaymentDto::from(payment))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn create_payment_url(
    State(state): State<Arc<PaymentsState>>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    let ip = client_ip(&headers);
    match state
        .reconciler
        .create_payment_url(&auth.actor, appointment_id, &ip)
        .await
    {
        Ok(payment_url) => (StatusCode::OK, Json(PaymentUrlDto { payment_url })).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn mark_paid_cash(
    State(state): State<Arc<PaymentsState>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match state
        .reconciler
        .mark_paid_cash(&auth.actor, appointment_id)
        .await
    {
        Ok(payment) => (StatusCode::OK, Json(PaymentDto::from(payment))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_callback_redirects_with_success() {
        let page = Url::parse("https://clinic.test/payment-result").unwrap();
        let location = result_redirect(
            &page,
            &CallbackResult {
                booking_code: "BK-20300101-080000-001".to_string(),
                outcome: CallbackOutcome::Paid,
            },
        );
        assert_eq!(
            location,
            "https://clinic.test/payment-result?status=success&bookingCode=BK-20300101-080000-001"
        );
    }

    #[test]
    fn user_cancel_redirects_as_cancelled() {
        let page = Url::parse("https://clinic.test/payment-result?lang=vi").unwrap();
        let location = result_redirect(
            &page,
            &CallbackResult {
                booking_code: "BK-1".to_string(),
                outcome: CallbackOutcome::Removed(GatewayOutcome::UserCancelled),
            },
        );
        assert!(location.contains("lang=vi"));
        assert!(location.contains("status=cancelled"));
        assert!(location.ends_with("bookingCode=BK-1"));
    }
}
