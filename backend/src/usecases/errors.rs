use axum::http::StatusCode;
use crates::domain::value_objects::enums::{appointment_statuses::AppointmentStatus, roles::Role};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("cannot move appointment from {from} to {to} as {role}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
        role: Role,
    },
    #[error("slot {0} is full")]
    SlotFull(Uuid),
    #[error("vaccine lot unavailable: {0}")]
    LotUnavailable(String),
    #[error("a vaccination record already exists for appointment {0}")]
    DuplicateRecord(Uuid),
    #[error("actor is not assigned to the appointment's center")]
    CenterMismatch,
    #[error("payment is already settled")]
    PaymentAlreadySettled,
    #[error("payment callback signature verification failed")]
    SignatureVerification,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("appointment {0} was modified concurrently; retry")]
    Conflict(Uuid),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidTransition { .. }
            | BookingError::Validation(_)
            | BookingError::SignatureVerification => StatusCode::BAD_REQUEST,
            BookingError::Forbidden(_) | BookingError::CenterMismatch => StatusCode::FORBIDDEN,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SlotFull(_)
            | BookingError::LotUnavailable(_)
            | BookingError::DuplicateRecord(_)
            | BookingError::PaymentAlreadySettled
            | BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BookingError>;

/// Logs an infrastructure failure and wraps it as `Internal`.
pub(crate) fn storage_failure(operation: &'static str) -> impl FnOnce(anyhow::Error) -> BookingError {
    move |err| {
        error!(db_error = ?err, operation, "storage failure");
        BookingError::Internal(err)
    }
}
