use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub refund_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Settled through the app, so cancelling it owes the customer a refund.
    pub fn is_paid_via_app(&self) -> bool {
        self.method == PaymentMethod::App && self.status == PaymentStatus::Paid
    }

    /// Claimed for refund, but the gateway never confirmed it.
    pub fn is_refund_unconfirmed(&self) -> bool {
        self.method == PaymentMethod::App
            && self.status == PaymentStatus::RefundRequested
            && self.refund_reference.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    App,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::App => "APP",
            PaymentMethod::Cash => "CASH",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "APP" => PaymentMethod::App,
            _ => PaymentMethod::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    RefundRequested,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::RefundRequested => "REFUND_REQUESTED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "REFUND_REQUESTED" => PaymentStatus::RefundRequested,
            "REFUNDED" => PaymentStatus::Refunded,
            _ => PaymentStatus::Paid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub booking_id: String,
    pub remind_at: DateTime<Utc>,
    pub sent: bool,
}
