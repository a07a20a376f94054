use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::value_objects::slots::{
    AvailableSlotsQuery, CreateSlotModel, SlotDto, SlotPageDto,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::slot_ledger::SlotLedger,
};

pub fn routes(slot_ledger: Arc<SlotLedger>) -> Router {
    Router::new()
        .route("/", post(create))
        .route("/available", get(available))
        .route("/:slot_id", get(find))
        .with_state(slot_ledger)
}

pub async fn available(
    State(slot_ledger): State<Arc<SlotLedger>>,
    Query(query): Query<AvailableSlotsQuery>,
) -> impl IntoResponse {
    match slot_ledger.available_page(query).await {
        Ok(page) => (
            StatusCode::OK,
            Json(SlotPageDto {
                slots: page.slots.into_iter().map(SlotDto::from).collect(),
                next: page.next,
            }),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn find(
    State(slot_ledger): State<Arc<SlotLedger>>,
    Path(slot_id): Path<Uuid>,
) -> impl IntoResponse {
    match slot_ledger.find_slot(slot_id).await {
        Ok(slot) => (StatusCode::OK, Json(SlotDto::from(slot))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

pub async fn create(
    State(slot_ledger): State<Arc<SlotLedger>>,
    auth: AuthUser,
    Json(model): Json<CreateSlotModel>,
) -> impl IntoResponse {
    match slot_ledger.create_slot(&auth.actor, model).await {
        Ok(slot) => (StatusCode::CREATED, Json(SlotDto::from(slot))).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
