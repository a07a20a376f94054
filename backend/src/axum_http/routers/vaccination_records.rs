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
    vaccinations::{RecordVaccinationModel, VaccinationRecordDto, VaccineLotDto},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{errors::BookingError, vaccination_recorder::VaccinationRecorder},
};

#[derive(Debug, Serialize)]
pub struct RecordedVaccinationDto {
    pub record: VaccinationRecordDto,
    pub lot: VaccineLotDto,
    pub appointment: AppointmentDto,
}

pub fn routes(recorder: Arc<VaccinationRecorder>) -> Router {
    Router::new()
        .route("/", post(record))
        .route("/:appointment_id", get(find))
        .with_state(recorder)
}

pub async fn record(
    State(recorder): State<Arc<VaccinationRecorder>>,
    auth: AuthUser,
    Json(model): Json<RecordVaccinationModel>,
) -> impl IntoResponse {
    match recorder.record(&auth.actor, model).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(RecordedVaccinationDto {
                record: recorded.record.into(),
                lot: recorded.lot.into(),
                appointment: recorded.appointment.into(),
            }),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn find(
    State(recorder): State<Arc<VaccinationRecorder>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> impl IntoResponse {
    match recorder.find(&auth.actor, appointment_id).await {
        Ok(Some(record)) => {
            (StatusCode::OK, Json(VaccinationRecordDto::from(record))).into_response()
        }
        Ok(None) => AppError::from(BookingError::NotFound("vaccination record")).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
