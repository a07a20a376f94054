pub mod appointment_reminders;
pub mod config;
pub mod lot_maintenance;
