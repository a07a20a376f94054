use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use crates::domain::value_objects::appointments::{
    AdvanceStatusModel, AppointmentDto, AppointmentTraceDto, BookAppointmentModel, BookingDto,
    CancelAppointmentModel, CancellationDto, ConsultationRequestModel, RescheduleModel,
    TransitionDto, WalkInModel,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::booking_orchestrator::{
        AppointmentTrace, BookingOrchestrator, BookingResult, CancellationResult,
    },
};

use super::client_ip;

pub fn routes(orchestrator: Arc<BookingOrchestrator>) -> Router {
    Router::new()
        .route("/", post(book))
        .route("/consultations", post(request_consultation))
        .route("/walk-ins", post(walk_in))
        .route("/codes/:booking_code/trace", get(trace_by_code))
        .route("/:appointment_id", delete(remove))
        .route("/:appointment_id/trace", get(trace))
        .route("/:appointment_id/cancel", post(cancel))
        .route("/:appointment_id/status", patch(advance_status))
        .route("/:appointment_id/reschedule", post(reschedule))
        .with_state(orchestrator)
}

fn booking_dto(result: BookingResult) -> BookingDto {
    BookingDto {
        appointment: result.appointment.into(),
        payment: result.payment.map(Into::into),
        payment_url: result.payment_url,
        warnings: result.warnings,
    }
}

fn cancellation_dto(result: CancellationResult) -> CancellationDto {
    CancellationDto {
        appointment: result.appointment.into(),
        changed: result.changed,
        cancellation_fee: result.cancellation_fee,
    }
}

fn trace_dto(trace: AppointmentTrace) -> AppointmentTraceDto {
    AppointmentTraceDto {
        appointment: trace.appointment.into(),
        payment: trace.payment.map(Into::into),
        screening: trace.screening.map(Into::into),
        vaccination_record: trace.vaccination_record.map(Into::into),
        history: trace.history.into_iter().map(Into::into).collect(),
    }
}

pub async fn book(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(model): Json<BookAppointmentModel>,
) -> impl IntoResponse {
    let ip = client_ip(&headers);
    match orchestrator.book_appointment(&auth.actor, model, &ip).await {
        Ok(result) => (StatusCode::CREATED, Json(booking_dto(result))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn request_consultation(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: Option<AuthUser>,
    Json(model): Json<ConsultationRequestModel>,
) -> impl IntoResponse {
    let actor = auth.map(|user| user.actor);
    match orchestrator.request_consultation(actor.as_ref(), model).await {
        Ok(appointment) => {
            (StatusCode::CREATED, Json(AppointmentDto::from(appointment))).into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn walk_in(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Json(model): Json<WalkInModel>,
) -> impl IntoResponse {
    match orchestrator.create_walk_in(&auth.actor, model).await {
        Ok(result) => (StatusCode::CREATED, Json(booking_dto(result))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn cancel(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<CancelAppointmentModel>>,
) -> impl IntoResponse {
    let reason = body.and_then(|Json(model)| model.reason);
    match orchestrator
        .cancel_appointment(&auth.actor, appointment_id, reason)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(cancellation_dto(result))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn advance_status(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(model): Json<AdvanceStatusModel>,
) -> impl IntoResponse {
    match orchestrator
        .advance_status(&auth.actor, appointment_id, model.status, model.reason)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(TransitionDto {
                appointment: outcome.appointment.into(),
                changed: outcome.changed,
                warnings: outcome.warnings,
            }),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn reschedule(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(model): Json<RescheduleModel>,
) -> impl IntoResponse {
    match orchestrator
        .reschedule(&auth.actor, appointment_id, model.slot_id)
        .await
    {
        Ok(appointment) => (StatusCode::OK, Json(AppointmentDto::from(appointment))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn remove(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match orchestrator
        .delete_appointment(&auth.actor, appointment_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn trace(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match orchestrator.trace_by_id(&auth.actor, appointment_id).await {
        Ok(trace) => (StatusCode::OK, Json(trace_dto(trace))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn trace_by_code(
    State(orchestrator): State<Arc<BookingOrchestrator>>,
    auth: AuthUser,
    Path(booking_code): Path<String>,
) -> impl IntoResponse {
    match orchestrator.trace(&auth.actor, &booking_code).await {
        Ok(trace) => (StatusCode::OK, Json(trace_dto(trace))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
