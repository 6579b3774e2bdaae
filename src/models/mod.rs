pub mod booking;
pub mod business;
pub mod coupon;
pub mod payment;
pub mod service;
pub mod user;
pub mod view;

pub use booking::{Booking, BookingStatus};
pub use business::{ApprovalStatus, Business, Staff};
pub use coupon::{Coupon, UserCoupon};
pub use payment::{Payment, PaymentMethod, PaymentStatus, Reminder};
pub use service::{Service, ServiceImage};
pub use user::User;
pub use view::{BookingDetails, BookingView};
