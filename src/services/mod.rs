pub mod approvals;
pub mod booking_executor;
pub mod booking_validator;
pub mod lifecycle;
pub mod listing;
pub mod payments;
pub mod tracking;
