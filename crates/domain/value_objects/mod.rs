pub mod actors;
pub mod appointments;
pub mod enums;
pub mod patients;
pub mod payments;
pub mod screenings;
pub mod slots;
pub mod vaccinations;
