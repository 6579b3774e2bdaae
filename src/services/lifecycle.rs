use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::{Identity, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ApprovalStatus, Booking, BookingDetails, BookingStatus, Payment};
use crate::services::booking_validator::parse_time_range;
use crate::state::AppState;

/// Who is changing a booking. Customers act on their own bookings, managers on their business's.
#[derive(Debug, Clone)]
pub enum Actor {
    Customer { user_id: String },
    Manager { user_id: String, business_id: String },
}

impl Actor {
    pub fn from_identity(identity: &Identity) -> Result<Self, AppError> {
        match identity.role {
            Role::Customer => Ok(Actor::Customer {
                user_id: identity.user_id.clone(),
            }),
            Role::Owner | Role::Manager | Role::Staff => {
                let business_id = identity.business_id.clone().ok_or(AppError::Unauthorized)?;
                Ok(Actor::Manager {
                    user_id: identity.user_id.clone(),
                    business_id,
                })
            }
            Role::Admin => Err(AppError::Unauthorized),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Actor::Customer { user_id } | Actor::Manager { user_id, .. } => user_id,
        }
    }

    fn may_access(&self, booking: &Booking) -> bool {
        match self {
            Actor::Customer { user_id } => booking.user_id == *user_id,
            Actor::Manager { business_id, .. } => booking.business_id == *business_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub staff_id: Option<String>,
}

fn not_found(booking_id: &str) -> AppError {
    AppError::NotFound(format!("booking not found: {booking_id}"))
}

fn load_for_actor(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
) -> Result<Booking, AppError> {
    // Someone else's booking looks the same as a missing one.
    let booking = queries::get_booking(conn, booking_id)?
        .filter(|b| actor.may_access(b))
        .ok_or_else(|| not_found(booking_id))?;

    if let Actor::Manager { business_id, .. } = actor {
        let business = queries::get_business(conn, business_id)?
            .ok_or_else(|| AppError::NotFound(format!("business not found: {business_id}")))?;
        if business.approval_status != ApprovalStatus::Approved {
            return Err(AppError::Forbidden("business is not approved".to_string()));
        }
    }

    Ok(booking)
}

fn ensure_customer_window(
    actor: &Actor,
    booking: &Booking,
    cutoff: Duration,
    now: &DateTime<Utc>,
) -> Result<(), AppError> {
    if let Actor::Customer { .. } = actor {
        if !booking.status.is_open() {
            return Err(AppError::Conflict(format!(
                "booking is already {}",
                booking.status.as_str()
            )));
        }
        if booking.start_time - *now < cutoff {
            return Err(AppError::Conflict(
                "booking can no longer be changed this close to its start time".to_string(),
            ));
        }
    }
    Ok(())
}

fn ensure_transition(booking: &Booking, next: BookingStatus) -> Result<(), AppError> {
    if !booking.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "cannot change booking from {} to {}",
            booking.status.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

fn reload(conn: &Connection, booking_id: &str) -> Result<BookingDetails, AppError> {
    let booking = queries::get_booking(conn, booking_id)?.ok_or_else(|| not_found(booking_id))?;
    Ok(queries::load_booking_details(conn, booking)?)
}

/// Runs the cancellation on its own task so a dropped request cannot stop it
/// between the refund and the status change.
pub async fn cancel_booking(
    state: Arc<AppState>,
    actor: Actor,
    booking_id: String,
) -> Result<BookingDetails, AppError> {
    tokio::spawn(async move { run_cancellation(&state, &actor, &booking_id).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("cancellation task failed")))?
}

/// Refund first, cancel second. The payment is claimed as REFUND_REQUESTED
/// before the gateway is called and gets its reference once the gateway
/// answers. A claim left without a reference is picked up again by the next
/// cancellation of the same booking.
async fn run_cancellation(
    state: &AppState,
    actor: &Actor,
    booking_id: &str,
) -> Result<BookingDetails, AppError> {
    let cutoff = Duration::minutes(state.config.customer_change_cutoff_minutes);

    let refund_due = {
        let db = state.db()?;
        let booking = load_for_actor(&db, actor, booking_id)?;
        if booking.status == BookingStatus::Cancelled {
            return Ok(queries::load_booking_details(&db, booking)?);
        }
        ensure_customer_window(actor, &booking, cutoff, &Utc::now())?;

        match queries::get_payment_for_booking(&db, booking_id)? {
            Some(payment) if payment.is_paid_via_app() => {
                if !queries::begin_refund(&db, &payment.id, &Utc::now())? {
                    return Err(AppError::Conflict("refund already in progress".to_string()));
                }
                Some((payment, true))
            }
            Some(payment) if payment.is_refund_unconfirmed() => {
                tracing::info!(booking_id, payment_id = %payment.id, "resuming refund");
                Some((payment, false))
            }
            _ => None,
        }
    };

    if let Some((payment, claimed)) = &refund_due {
        let refund = state
            .payments
            .request_refund(&payment.id, booking_id, payment.amount_cents)
            .await;
        let receipt = match refund {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(
                    booking_id,
                    payment_id = %payment.id,
                    error = %e,
                    "refund request failed"
                );
                if *claimed {
                    let db = state.db()?;
                    queries::abandon_refund(&db, &payment.id, &Utc::now())?;
                }
                return Err(AppError::Gateway(e));
            }
        };

        let db = state.db()?;
        if queries::record_refund_reference(&db, &payment.id, &receipt.reference, &Utc::now())? {
            tracing::info!(
                booking_id,
                payment_id = %payment.id,
                reference = %receipt.reference,
                "refund requested"
            );
        } else {
            tracing::warn!(
                booking_id,
                payment_id = %payment.id,
                reference = %receipt.reference,
                "refund reference already recorded"
            );
        }
    }

    let db = state.db()?;
    if !queries::update_booking_status(&db, booking_id, BookingStatus::Cancelled, &Utc::now())? {
        return Err(not_found(booking_id));
    }
    tracing::info!(
        booking_id,
        actor = actor.user_id(),
        refunded = refund_due.is_some(),
        "booking cancelled"
    );

    reload(&db, booking_id)
}

pub fn reschedule_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    req: &RescheduleRequest,
    cutoff: Duration,
    now: &DateTime<Utc>,
) -> Result<BookingDetails, AppError> {
    let start_raw = req.start_time.as_deref().filter(|s| !s.trim().is_empty());
    let end_raw = req.end_time.as_deref().filter(|s| !s.trim().is_empty());
    let (Some(start_raw), Some(end_raw)) = (start_raw, end_raw) else {
        let mut missing = vec![];
        if start_raw.is_none() {
            missing.push("startTime");
        }
        if end_raw.is_none() {
            missing.push("endTime");
        }
        return Err(AppError::MissingFields(missing));
    };

    let (start, end) = parse_time_range(start_raw, end_raw)?;
    if start <= *now {
        return Err(AppError::Validation(
            "start time must be in the future".to_string(),
        ));
    }

    let booking = load_for_actor(conn, actor, booking_id)?;
    ensure_customer_window(actor, &booking, cutoff, now)?;
    ensure_transition(&booking, BookingStatus::Rescheduled)?;

    let next = BookingStatus::Rescheduled;
    if !queries::update_booking_times(conn, booking_id, &start, &end, next, now)? {
        return Err(not_found(booking_id));
    }
    tracing::info!(booking_id, actor = actor.user_id(), %start, %end, "booking rescheduled");

    reload(conn, booking_id)
}

pub fn reassign_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    req: &ReassignRequest,
    now: &DateTime<Utc>,
) -> Result<BookingDetails, AppError> {
    let staff_id = req
        .staff_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::MissingFields(vec!["staffId"]))?;

    let booking = load_for_actor(conn, actor, booking_id)?;
    if !booking.status.is_open() {
        return Err(AppError::Conflict(format!(
            "booking is already {}",
            booking.status.as_str()
        )));
    }

    let staff = queries::get_staff(conn, staff_id)?;
    if staff.map(|s| s.business_id) != Some(booking.business_id.clone()) {
        return Err(AppError::Validation(
            "staff member does not belong to this business".to_string(),
        ));
    }

    if !queries::update_booking_staff(conn, booking_id, staff_id, now)? {
        return Err(not_found(booking_id));
    }
    tracing::info!(booking_id, staff_id, actor = actor.user_id(), "booking reassigned");

    reload(conn, booking_id)
}

/// Confirm, complete, no-show and the like.
pub fn set_booking_status(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    next: BookingStatus,
    now: &DateTime<Utc>,
) -> Result<BookingDetails, AppError> {
    let booking = load_for_actor(conn, actor, booking_id)?;
    ensure_transition(&booking, next)?;

    if !queries::update_booking_status(conn, booking_id, next, now)? {
        return Err(not_found(booking_id));
    }
    tracing::info!(
        booking_id,
        from = booking.status.as_str(),
        to = next.as_str(),
        actor = actor.user_id(),
        "booking status changed"
    );

    reload(conn, booking_id)
}
