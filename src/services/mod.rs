pub mod availability;
pub mod notify;
pub mod pricing;
pub mod reservation;
pub mod seating;
pub mod settlement;
