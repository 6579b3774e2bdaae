use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Booking, BookingStatus, Business, Coupon, Payment, Reminder, Service, ServiceImage};

/// A booking with everything the response embeds, as loaded from the store.
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub service: Service,
    /// Newest first.
    pub service_images: Vec<ServiceImage>,
    pub business: Business,
    pub coupon: Option<Coupon>,
    pub payment: Option<Payment>,
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub business_id: String,
    pub staff_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub coupon_id: Option<String>,
    pub paid_via_app: bool,
    pub service: ServiceView,
    pub business: BusinessView,
    pub coupon: Option<CouponView>,
    pub payment: Option<PaymentView>,
    pub reminders: Vec<ReminderView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Older clients read a single `imageUrl`; the image list itself is never sent.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessView {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    pub id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: String,
    pub amount_cents: i64,
    pub method: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderView {
    pub id: String,
    pub remind_at: DateTime<Utc>,
    pub sent: bool,
}

impl From<BookingDetails> for BookingView {
    fn from(details: BookingDetails) -> Self {
        let BookingDetails {
            booking,
            service,
            service_images,
            business,
            coupon,
            payment,
            reminders,
        } = details;

        let paid_via_app = payment.as_ref().is_some_and(Payment::is_paid_via_app);

        BookingView {
            id: booking.id,
            user_id: booking.user_id,
            service_id: booking.service_id,
            business_id: booking.business_id,
            staff_id: booking.staff_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: booking.status,
            coupon_id: booking.coupon_id,
            paid_via_app,
            service: ServiceView {
                id: service.id,
                business_id: service.business_id,
                name: service.name,
                duration_minutes: service.duration_minutes,
                price_cents: service.price_cents,
                image_url: service_images.into_iter().next().map(|img| img.url),
            },
            business: BusinessView {
                id: business.id,
                name: business.name,
            },
            coupon: coupon.map(|c| CouponView {
                id: c.id,
                code: c.code,
                expires_at: c.expires_at,
            }),
            payment: payment.map(|p| PaymentView {
                id: p.id,
                amount_cents: p.amount_cents,
                method: p.method.as_str().to_string(),
                status: p.status.as_str().to_string(),
            }),
            reminders: reminders
                .into_iter()
                .map(|r| ReminderView {
                    id: r.id,
                    remind_at: r.remind_at,
                    sent: r.sent,
                })
                .collect(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}
