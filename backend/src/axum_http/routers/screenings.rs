use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::{
    appointments::AppointmentDto,
    screenings::{ScreeningDto, ScreeningSubmission},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{errors::BookingError, screening_gate::ScreeningGate},
};

#[derive(Debug, Serialize)]
pub struct ScreeningOutcomeDto {
    pub screening: ScreeningDto,
    pub appointment: AppointmentDto,
}

pub fn routes(screening_gate: Arc<ScreeningGate>) -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/:appointment_id", get(find))
        .with_state(screening_gate)
}

pub async fn submit(
    State(screening_gate): State<Arc<ScreeningGate>>,
    auth: AuthUser,
    Json(submission): Json<ScreeningSubmission>,
) -> impl IntoResponse {
    match screening_gate.submit(&auth.actor, submission).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ScreeningOutcomeDto {
                screening: outcome.screening.into(),
                appointment: outcome.appointment.into(),
            }),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn find(
    State(screening_gate): State<Arc<ScreeningGate>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match screening_gate.find(&auth.actor, appointment_id).await {
        Ok(Some(screening)) => (StatusCode::OK, Json(ScreeningDto::from(screening))).into_response(),
        Ok(None) => AppError::from(BookingError::NotFound("screening")).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
