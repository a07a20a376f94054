pub mod appointment_slots;
pub mod appointments;
pub mod family_members;
pub mod payments;
pub mod screenings;
pub mod vaccination_records;
pub mod vaccine_lots;
pub mod vaccines;
