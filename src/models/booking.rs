use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub business_id: String,
    pub staff_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub coupon_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    Rescheduled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
            BookingStatus::Rescheduled => "RESCHEDULED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            "NO_SHOW" => Some(BookingStatus::NoShow),
            "RESCHEDULED" => Some(BookingStatus::Rescheduled),
            _ => None,
        }
    }

    /// Status only moves forward, except PENDING <-> CONFIRMED and any -> CANCELLED.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (_, Cancelled) => true,
            (Cancelled, _) => false,
            (Completed | NoShow, _) => false,
            (Pending | Confirmed, _) => true,
            (Rescheduled, Rescheduled | Completed | NoShow) => true,
            (Rescheduled, Pending | Confirmed) => false,
        }
    }

    /// Customers may still cancel or move the booking.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Rescheduled
        )
    }
}
