pub mod analytics;
pub mod bookings;
pub mod catalog;
pub mod guard;
pub mod orders;
pub mod profiles;
