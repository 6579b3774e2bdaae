use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingDetails, Reminder};
use crate::services::booking_validator::{ValidatedBooking, INVALID_COUPON};

/// Persists a validated booking. The booking row, its reminder and the coupon
/// redemption commit together or not at all.
pub fn execute_booking(
    conn: &mut Connection,
    validated: ValidatedBooking,
    reminder_lead: Duration,
    now: &DateTime<Utc>,
) -> Result<BookingDetails, AppError> {
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: validated.user_id.clone(),
        service_id: validated.service.id.clone(),
        business_id: validated.business.id.clone(),
        staff_id: None,
        start_time: validated.start_time,
        end_time: validated.end_time,
        status: validated.status,
        coupon_id: validated.redemption.as_ref().map(|r| r.coupon_id.clone()),
        created_at: *now,
        updated_at: *now,
    };

    let tx = conn
        .transaction()
        .context("failed to begin booking transaction")?;

    queries::insert_booking(&tx, &booking).context("failed to insert booking")?;

    let remind_at = booking.start_time - reminder_lead;
    if remind_at > *now {
        queries::insert_reminder(
            &tx,
            &Reminder {
                id: uuid::Uuid::new_v4().to_string(),
                booking_id: booking.id.clone(),
                remind_at,
                sent: false,
            },
        )
        .context("failed to schedule reminder")?;
    }

    if let Some(redemption) = &validated.redemption {
        // Conditional on `used_at IS NULL`, so a concurrent redemption of the
        // same coupon leaves zero rows and this whole booking rolls back.
        if !queries::consume_user_coupon(&tx, &redemption.id, now)? {
            tracing::warn!(
                user_id = %booking.user_id,
                user_coupon_id = %redemption.id,
                "coupon was redeemed by another booking first"
            );
            return Err(AppError::Validation(INVALID_COUPON.to_string()));
        }
        queries::increment_coupon_usage(&tx, &redemption.coupon_id)?;
    }

    tx.commit().context("failed to commit booking")?;

    tracing::info!(
        booking_id = %booking.id,
        user_id = %booking.user_id,
        business_id = %booking.business_id,
        coupon_id = booking.coupon_id.as_deref().unwrap_or("-"),
        "booking created"
    );

    // Respond with what was stored, not the in-memory copy
    let stored = queries::get_booking(conn, &booking.id)?
        .ok_or_else(|| anyhow::anyhow!("booking {} missing after commit", booking.id))?;
    Ok(queries::load_booking_details(conn, stored)?)
}
