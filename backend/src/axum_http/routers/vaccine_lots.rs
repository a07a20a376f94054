use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Local;
use crates::domain::value_objects::{
    enums::roles::Role,
    vaccinations::{RegisterLotModel, VaccineLotDto},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{errors::BookingError, vaccine_lot_ledger::VaccineLotLedger},
};

pub struct VaccineLotsState {
    pub lot_ledger: Arc<VaccineLotLedger>,
    pub expiry_warning_days: i64,
    pub low_stock_threshold: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct WarningsQuery {
    pub days: Option<i64>,
    pub threshold: Option<i32>,
}

pub fn routes(state: VaccineLotsState) -> Router {
    Router::new()
        .route("/", get(list).post(register))
        .route("/warnings", get(warnings))
        .route("/sweep", post(sweep))
        .route("/:lot_id", get(find))
        .with_state(Arc::new(state))
}

fn ensure_clinic_side(auth: &AuthUser) -> Result<(), AppError> {
    if auth.actor.role == Role::Customer {
        return Err(BookingError::Forbidden("vaccine lots are staff-only".to_string()).into());
    }
    Ok(())
}

pub async fn list(
    State(state): State<Arc<VaccineLotsState>>,
    auth: AuthUser,
) -> impl IntoResponse {
    if let Err(e) = ensure_clinic_side(&auth) {
        return e.into_response();
    }
    match state.lot_ledger.list_lots().await {
        Ok(lots) => (
            StatusCode::OK,
            Json(lots.into_iter().map(VaccineLotDto::from).collect::<Vec<_>>()),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn find(
    State(state): State<Arc<VaccineLotsState>>,
    auth: AuthUser,
    Path(lot_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(e) = ensure_clinic_side(&auth) {
        return e.into_response();
    }
    match state.lot_ledger.find_lot(lot_id).await {
        Ok(lot) => (StatusCode::OK, Json(VaccineLotDto::from(lot))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn register(
    State(state): State<Arc<VaccineLotsState>>,
    auth: AuthUser,
    Json(model): Json<RegisterLotModel>,
) -> impl IntoResponse {
    let today = Local::now().date_naive();
    match state.lot_ledger.register_lot(&auth.actor, model, today).await {
        Ok(lot) => (StatusCode::CREATED, Json(VaccineLotDto::from(lot))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn warnings(
    State(state): State<Arc<VaccineLotsState>>,
    auth: AuthUser,
    Query(query): Query<WarningsQuery>,
) -> impl IntoResponse {
    if let Err(e) = ensure_clinic_side(&auth) {
        return e.into_response();
    }
    let today = Local::now().date_naive();
    let days = query.days.unwrap_or(state.expiry_warning_days);
    let threshold = query.threshold.unwrap_or(state.low_stock_threshold);
    match state.lot_ledger.warnings(today, days, threshold).await {
        Ok(warnings) => (StatusCode::OK, Json(warnings)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn sweep(
    State(state): State<Arc<VaccineLotsState>>,
    auth: AuthUser,
) -> impl IntoResponse {
    if !auth.actor.is_admin() {
        return AppError::from(BookingError::Forbidden(
            "only admins run the lot sweep".to_string(),
        ))
        .into_response();
    }
    match state.lot_ledger.sweep_statuses(Local::now().date_naive()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
