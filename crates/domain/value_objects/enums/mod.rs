pub mod appointment_statuses;
pub mod payment_methods;
pub mod payment_statuses;
pub mod roles;
pub mod screening_results;
pub mod vaccine_lot_statuses;
