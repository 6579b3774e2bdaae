use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::models::{
    ApprovalStatus, Booking, BookingDetails, BookingStatus, Business, Coupon, Payment,
    PaymentMethod, PaymentStatus, Reminder, Service, ServiceImage, Staff, User, UserCoupon,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("malformed timestamp in database: {s}"))?;
    Ok(naive.and_utc())
}

fn parse_optional_timestamp(s: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.name, user.email, user.role],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, role FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

// ── Businesses ──

pub fn create_business(conn: &Connection, business: &Business) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO businesses (id, name, approval_status) VALUES (?1, ?2, ?3)",
        params![business.id, business.name, business.approval_status.as_str()],
    )?;
    Ok(())
}

pub fn get_business(conn: &Connection, id: &str) -> anyhow::Result<Option<Business>> {
    let business = conn
        .query_row(
            "SELECT id, name, approval_status FROM businesses WHERE id = ?1",
            params![id],
            |row| {
                let status: String = row.get(2)?;
                Ok(Business {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    approval_status: ApprovalStatus::parse(&status),
                })
            },
        )
        .optional()?;
    Ok(business)
}

pub fn set_business_approval(
    conn: &Connection,
    id: &str,
    status: ApprovalStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE businesses SET approval_status = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

// ── Staff ──

pub fn create_staff(conn: &Connection, staff: &Staff) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO staff (id, business_id, name) VALUES (?1, ?2, ?3)",
        params![staff.id, staff.business_id, staff.name],
    )?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &str) -> anyhow::Result<Option<Staff>> {
    let staff = conn
        .query_row(
            "SELECT id, business_id, name FROM staff WHERE id = ?1",
            params![id],
            |row| {
                Ok(Staff {
                    id: row.get(0)?,
                    business_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(staff)
}

// ── Services ──

pub fn create_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, business_id, name, duration_minutes, price_cents)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            service.id,
            service.business_id,
            service.name,
            service.duration_minutes,
            service.price_cents,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            "SELECT id, business_id, name, duration_minutes, price_cents
             FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok(Service {
                    id: row.get(0)?,
                    business_id: row.get(1)?,
                    name: row.get(2)?,
                    duration_minutes: row.get(3)?,
                    price_cents: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(service)
}

pub fn add_service_image(conn: &Connection, image: &ServiceImage) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO service_images (id, service_id, url, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            image.id,
            image.service_id,
            image.url,
            format_timestamp(&image.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn get_service_images(
    conn: &Connection,
    service_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ServiceImage>> {
    let mut stmt = conn.prepare(
        "SELECT id, service_id, url, created_at FROM service_images
         WHERE service_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![service_id, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut images = vec![];
    for row in rows {
        let (id, service_id, url, created_at) = row?;
        images.push(ServiceImage {
            id,
            service_id,
            url,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(images)
}

// ── Coupons ──

pub fn create_coupon(conn: &Connection, coupon: &Coupon) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO coupons (id, business_id, code, expires_at, usage_count)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            coupon.id,
            coupon.business_id,
            coupon.code,
            format_timestamp(&coupon.expires_at),
            coupon.usage_count,
        ],
    )?;
    Ok(())
}

pub fn get_coupon(conn: &Connection, id: &str) -> anyhow::Result<Option<Coupon>> {
    let row = conn
        .query_row(
            "SELECT id, business_id, code, expires_at, usage_count FROM coupons WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, business_id, code, expires_at, usage_count)| {
        Ok(Coupon {
            id,
            business_id,
            code,
            expires_at: parse_timestamp(&expires_at)?,
            usage_count,
        })
    })
    .transpose()
}

pub fn create_user_coupon(conn: &Connection, user_coupon: &UserCoupon) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO user_coupons (id, user_id, coupon_id, used_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            user_coupon.id,
            user_coupon.user_id,
            user_coupon.coupon_id,
            user_coupon.used_at.as_ref().map(format_timestamp),
        ],
    )?;
    Ok(())
}

pub fn get_user_coupon(conn: &Connection, id: &str) -> anyhow::Result<Option<UserCoupon>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, coupon_id, used_at FROM user_coupons WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, user_id, coupon_id, used_at)| {
        Ok(UserCoupon {
            id,
            user_id,
            coupon_id,
            used_at: parse_optional_timestamp(used_at)?,
        })
    })
    .transpose()
}

/// An unused, unexpired coupon of `business_id` held by `user_id` under `code`.
pub fn find_redeemable_user_coupon(
    conn: &Connection,
    user_id: &str,
    code: &str,
    business_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Option<UserCoupon>> {
    let row = conn
        .query_row(
            "SELECT uc.id, uc.user_id, uc.coupon_id
             FROM user_coupons uc
             INNER JOIN coupons c ON c.id = uc.coupon_id
             WHERE uc.user_id = ?1
               AND uc.used_at IS NULL
               AND c.code = ?2
               AND c.business_id = ?3
               AND c.expires_at > ?4
             ORDER BY c.expires_at ASC
             LIMIT 1",
            params![user_id, code, business_id, format_timestamp(now)],
            |row| {
                Ok(UserCoupon {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    coupon_id: row.get(2)?,
                    used_at: None,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Marks the redemption used only if nobody has used it yet. `false` means it was already taken.
pub fn consume_user_coupon(
    conn: &Connection,
    user_coupon_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE user_coupons SET used_at = ?1 WHERE id = ?2 AND used_at IS NULL",
        params![format_timestamp(now), user_coupon_id],
    )?;
    Ok(count == 1)
}

pub fn increment_coupon_usage(conn: &Connection, coupon_id: &str) -> anyhow::Result<()> {
    let count = conn.execute(
        "UPDATE coupons SET usage_count = usage_count + 1 WHERE id = ?1",
        params![coupon_id],
    )?;
    if count == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows)
            .with_context(|| format!("coupon {coupon_id} vanished while being redeemed"));
    }
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, service_id, business_id, staff_id, start_time, \
     end_time, status, coupon_id, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, business_id, staff_id, start_time,
                               end_time, status, coupon_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            booking.business_id,
            booking.staff_id,
            format_timestamp(&booking.start_time),
            format_timestamp(&booking.end_time),
            booking.status.as_str(),
            booking.coupon_id,
            format_timestamp(&booking.created_at),
            format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings starting strictly after `now`, soonest first.
pub fn get_upcoming_bookings(
    conn: &Connection,
    user_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    query_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE user_id = ?1 AND start_time > ?2 ORDER BY start_time ASC, id ASC"
        ),
        user_id,
        now,
    )
}

/// Bookings that ended strictly before `now`, most recent first.
pub fn get_past_bookings(
    conn: &Connection,
    user_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    query_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE user_id = ?1 AND end_time < ?2 ORDER BY end_time DESC, id ASC"
        ),
        user_id,
        now,
    )
}

fn query_bookings(
    conn: &Connection,
    sql: &str,
    user_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![user_id, format_timestamp(now)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;
    Ok(count)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_times(
    conn: &Connection,
    id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    status: BookingStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET start_time = ?1, end_time = ?2, status = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            format_timestamp(start),
            format_timestamp(end),
            status.as_str(),
            format_timestamp(now),
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_booking_staff(
    conn: &Connection,
    id: &str,
    staff_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET staff_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![staff_id, format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_time: String = row.get(5)?;
    let end_time: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow!("unknown booking status in database: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        business_id: row.get(3)?,
        staff_id: row.get(4)?,
        start_time: parse_timestamp(&start_time)?,
        end_time: parse_timestamp(&end_time)?,
        status,
        coupon_id: row.get(8)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Loads everything a booking response embeds.
pub fn load_booking_details(conn: &Connection, booking: Booking) -> anyhow::Result<BookingDetails> {
    let service = get_service(conn, &booking.service_id)?
        .ok_or_else(|| anyhow!("booking {} references missing service", booking.id))?;
    let service_images = get_service_images(conn, &booking.service_id, 1)?;
    let business = get_business(conn, &booking.business_id)?
        .ok_or_else(|| anyhow!("booking {} references missing business", booking.id))?;
    let coupon = match booking.coupon_id.as_deref() {
        Some(coupon_id) => get_coupon(conn, coupon_id)?,
        None => None,
    };
    let payment = get_payment_for_booking(conn, &booking.id)?;
    let reminders = get_reminders_for_booking(conn, &booking.id)?;

    Ok(BookingDetails {
        booking,
        service,
        service_images,
        business,
        coupon,
        payment,
        reminders,
    })
}

// ── Payments ──

pub fn create_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, amount_cents, method, status, refund_reference,
                               created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            payment.id,
            payment.booking_id,
            payment.amount_cents,
            payment.method.as_str(),
            payment.status.as_str(),
            payment.refund_reference,
            format_timestamp(&payment.created_at),
            format_timestamp(&payment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let row = conn
        .query_row(
            "SELECT id, booking_id, amount_cents, method, status, refund_reference,
                    created_at, updated_at
             FROM payments WHERE booking_id = ?1",
            params![booking_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    row.map(
        |(id, booking_id, amount_cents, method, status, refund_reference, created_at, updated_at)| {
            Ok(Payment {
                id,
                booking_id,
                amount_cents,
                method: PaymentMethod::parse(&method),
                status: PaymentStatus::parse(&status),
                refund_reference,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            })
        },
    )
    .transpose()
}

/// Claims a PAID payment for refund before the gateway is called. The row stays
/// REFUND_REQUESTED with no reference until the gateway answers.
pub fn begin_refund(
    conn: &Connection,
    payment_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = ?1, refund_reference = NULL, updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![
            PaymentStatus::RefundRequested.as_str(),
            format_timestamp(now),
            payment_id,
            PaymentStatus::Paid.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn record_refund_reference(
    conn: &Connection,
    payment_id: &str,
    reference: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET refund_reference = ?1, updated_at = ?2
         WHERE id = ?3 AND status = ?4 AND refund_reference IS NULL",
        params![
            reference,
            format_timestamp(now),
            payment_id,
            PaymentStatus::RefundRequested.as_str(),
        ],
    )?;
    Ok(count > 0)
}

/// Returns a claimed payment to PAID after the gateway refused the refund.
pub fn abandon_refund(
    conn: &Connection,
    payment_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE payments SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = ?4 AND refund_reference IS NULL",
        params![
            PaymentStatus::Paid.as_str(),
            format_timestamp(now),
            payment_id,
            PaymentStatus::RefundRequested.as_str(),
        ],
    )?;
    Ok(count > 0)
}

// ── Reminders ──

pub fn insert_reminder(conn: &Connection, reminder: &Reminder) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reminders (id, booking_id, remind_at, sent) VALUES (?1, ?2, ?3, ?4)",
        params![
            reminder.id,
            reminder.booking_id,
            format_timestamp(&reminder.remind_at),
            reminder.sent as i32,
        ],
    )?;
    Ok(())
}

pub fn get_reminders_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<Reminder>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, remind_at, sent FROM reminders
         WHERE booking_id = ?1 ORDER BY remind_at ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i32>(3)? != 0,
        ))
    })?;

    let mut reminders = vec![];
    for row in rows {
        let (id, booking_id, remind_at, sent) = row?;
        reminders.push(Reminder {
            id,
            booking_id,
            remind_at: parse_timestamp(&remind_at)?,
            sent,
        });
    }
    Ok(reminders)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub reminder_id: String,
    pub booking_id: String,
    pub service_name: String,
    pub business_name: String,
    pub start_time: DateTime<Utc>,
    pub remind_at: DateTime<Utc>,
}

/// Unsent reminders for the user's bookings that are still going ahead.
pub fn get_pending_notifications(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Vec<UserNotification>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, b.id, s.name, bz.name, b.start_time, r.remind_at
         FROM reminders r
         INNER JOIN bookings b ON b.id = r.booking_id
         INNER JOIN services s ON s.id = b.service_id
         INNER JOIN businesses bz ON bz.id = b.business_id
         WHERE b.user_id = ?1 AND r.sent = 0 AND b.status != ?2
         ORDER BY r.remind_at ASC",
    )?;

    let rows = stmt.query_map(params![user_id, BookingStatus::Cancelled.as_str()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut notifications = vec![];
    for row in rows {
        let (reminder_id, booking_id, service_name, business_name, start_time, remind_at) = row?;
        notifications.push(UserNotification {
            reminder_id,
            booking_id,
            service_name,
            business_name,
            start_time: parse_timestamp(&start_time)?,
            remind_at: parse_timestamp(&remind_at)?,
        });
    }
    Ok(notifications)
}

// ── Idempotency Keys ──

#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status_code: u16,
    pub body: String,
}

pub fn get_stored_response(
    conn: &Connection,
    key: &str,
    scope: &str,
) -> anyhow::Result<Option<StoredResponse>> {
    let stored = conn
        .query_row(
            "SELECT status_code, response FROM idempotency_keys WHERE key = ?1 AND scope = ?2",
            params![key, scope],
            |row| {
                Ok(StoredResponse {
                    status_code: row.get(0)?,
                    body: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(stored)
}

pub fn store_response(
    conn: &Connection,
    key: &str,
    scope: &str,
    response: &StoredResponse,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO idempotency_keys (key, scope, status_code, response) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key, scope) DO NOTHING",
        params![key, scope, response.status_code, response.body],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::{Duration, TimeZone};

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        create_user(
            &conn,
            &User {
                id: "user-1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                role: "CUSTOMER".to_string(),
            },
        )
        .unwrap();
        create_business(
            &conn,
            &Business {
                id: "biz1".to_string(),
                name: "Shear Genius".to_string(),
                approval_status: ApprovalStatus::Approved,
            },
        )
        .unwrap();
        create_service(
            &conn,
            &Service {
                id: "svc1".to_string(),
                business_id: "biz1".to_string(),
                name: "Haircut".to_string(),
                duration_minutes: 60,
                price_cents: 4500,
            },
        )
        .unwrap();
        conn
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn booking(id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
        Booking {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            service_id: "svc1".to_string(),
            business_id: "biz1".to_string(),
            staff_id: None,
            start_time: start,
            end_time: end,
            status: BookingStatus::Pending,
            coupon_id: None,
            created_at: at(1, 0),
            updated_at: at(1, 0),
        }
    }

    fn seed_coupon(conn: &Connection, expires_at: DateTime<Utc>) {
        create_coupon(
            conn,
            &Coupon {
                id: "cpn-1".to_string(),
                business_id: "biz1".to_string(),
                code: "SUMMER10".to_string(),
                expires_at,
                usage_count: 0,
            },
        )
        .unwrap();
        create_user_coupon(
            conn,
            &UserCoupon {
                id: "uc-1".to_string(),
                user_id: "user-1".to_string(),
                coupon_id: "cpn-1".to_string(),
                used_at: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_booking_roundtrip() {
        let conn = setup_db();
        insert_booking(&conn, &booking("bk-1", at(2, 9), at(2, 10))).unwrap();

        let loaded = get_booking(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(loaded.start_time, at(2, 9));
        assert_eq!(loaded.status, BookingStatus::Pending);
        assert!(get_booking(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_inverted_range_rejected_by_schema() {
        let conn = setup_db();
        let result = insert_booking(&conn, &booking("bk-1", at(2, 10), at(2, 9)));
        assert!(result.is_err());
        assert_eq!(count_bookings(&conn).unwrap(), 0);
    }

    #[test]
    fn test_upcoming_and_past_use_literal_predicates() {
        let conn = setup_db();
        let now = at(10, 12);
        insert_booking(&conn, &booking("future-late", at(12, 9), at(12, 10))).unwrap();
        insert_booking(&conn, &booking("future-soon", at(11, 9), at(11, 10))).unwrap();
        insert_booking(&conn, &booking("past-old", at(3, 9), at(3, 10))).unwrap();
        insert_booking(&conn, &booking("past-recent", at(8, 9), at(8, 10))).unwrap();
        insert_booking(&conn, &booking("straddling", at(10, 11), at(10, 13))).unwrap();

        let upcoming: Vec<String> = get_upcoming_bookings(&conn, "user-1", &now)
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(upcoming, vec!["future-soon", "future-late"]);

        let past: Vec<String> = get_past_bookings(&conn, "user-1", &now)
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(past, vec!["past-recent", "past-old"]);
    }

    #[test]
    fn test_redeemable_coupon_requires_future_expiry() {
        let conn = setup_db();
        let now = at(10, 12);
        seed_coupon(&conn, now);

        // Expiry equal to now is already expired
        let found = find_redeemable_user_coupon(&conn, "user-1", "SUMMER10", "biz1", &now).unwrap();
        assert!(found.is_none());

        let earlier = now - Duration::hours(1);
        let found =
            find_redeemable_user_coupon(&conn, "user-1", "SUMMER10", "biz1", &earlier).unwrap();
        assert_eq!(found.unwrap().id, "uc-1");
    }

    #[test]
    fn test_redeemable_coupon_scoped_to_business_and_user() {
        let conn = setup_db();
        let now = at(10, 12);
        seed_coupon(&conn, at(20, 0));

        assert!(find_redeemable_user_coupon(&conn, "user-1", "SUMMER10", "biz2", &now)
            .unwrap()
            .is_none());
        assert!(find_redeemable_user_coupon(&conn, "user-2", "SUMMER10", "biz1", &now)
            .unwrap()
            .is_none());
        assert!(find_redeemable_user_coupon(&conn, "user-1", "WINTER", "biz1", &now)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_consume_user_coupon_only_once() {
        let conn = setup_db();
        let now = at(10, 12);
        seed_coupon(&conn, at(20, 0));

        assert!(consume_user_coupon(&conn, "uc-1", &now).unwrap());
        assert!(!consume_user_coupon(&conn, "uc-1", &now).unwrap());

        let uc = get_user_coupon(&conn, "uc-1").unwrap().unwrap();
        assert_eq!(uc.used_at, Some(now));
        assert!(find_redeemable_user_coupon(&conn, "user-1", "SUMMER10", "biz1", &now)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_service_images_newest_first() {
        let conn = setup_db();
        for (id, hour) in [("img-a", 1), ("img-c", 3), ("img-b", 2)] {
            add_service_image(
                &conn,
                &ServiceImage {
                    id: id.to_string(),
                    service_id: "svc1".to_string(),
                    url: format!("https://cdn/{id}.jpg"),
                    created_at: at(1, hour),
                },
            )
            .unwrap();
        }

        let images = get_service_images(&conn, "svc1", 1).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "img-c");
    }

    #[test]
    fn test_refund_claimed_only_from_paid() {
        let conn = setup_db();
        insert_booking(&conn, &booking("bk-1", at(2, 9), at(2, 10))).unwrap();
        create_payment(
            &conn,
            &Payment {
                id: "pay-1".to_string(),
                booking_id: "bk-1".to_string(),
                amount_cents: 4500,
                method: PaymentMethod::App,
                status: PaymentStatus::Paid,
                refund_reference: None,
                created_at: at(1, 0),
                updated_at: at(1, 0),
            },
        )
        .unwrap();

        assert!(begin_refund(&conn, "pay-1", &at(1, 1)).unwrap());
        assert!(!begin_refund(&conn, "pay-1", &at(1, 2)).unwrap());

        let payment = get_payment_for_booking(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::RefundRequested);
        assert!(payment.refund_reference.is_none());

        assert!(record_refund_reference(&conn, "pay-1", "rf_1", &at(1, 3)).unwrap());
        assert!(!record_refund_reference(&conn, "pay-1", "rf_2", &at(1, 4)).unwrap());
        // A referenced refund can no longer be abandoned
        assert!(!abandon_refund(&conn, "pay-1", &at(1, 5)).unwrap());

        let payment = get_payment_for_booking(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::RefundRequested);
        assert_eq!(payment.refund_reference.as_deref(), Some("rf_1"));
    }

    #[test]
    fn test_abandoned_refund_returns_to_paid() {
        let conn = setup_db();
        insert_booking(&conn, &booking("bk-1", at(2, 9), at(2, 10))).unwrap();
        create_payment(
            &conn,
            &Payment {
                id: "pay-1".to_string(),
                booking_id: "bk-1".to_string(),
                amount_cents: 4500,
                method: PaymentMethod::App,
                status: PaymentStatus::Paid,
                refund_reference: None,
                created_at: at(1, 0),
                updated_at: at(1, 0),
            },
        )
        .unwrap();

        assert!(begin_refund(&conn, "pay-1", &at(1, 1)).unwrap());
        assert!(abandon_refund(&conn, "pay-1", &at(1, 2)).unwrap());

        let payment = get_payment_for_booking(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_stored_response_first_write_wins() {
        let conn = setup_db();
        let first = StoredResponse {
            status_code: 200,
            body: "{\"first\":true}".to_string(),
        };
        let second = StoredResponse {
            status_code: 200,
            body: "{\"first\":false}".to_string(),
        };
        store_response(&conn, "key-1", "approve:biz1", &first).unwrap();
        store_response(&conn, "key-1", "approve:biz1", &second).unwrap();

        let stored = get_stored_response(&conn, "key-1", "approve:biz1").unwrap().unwrap();
        assert_eq!(stored.body, "{\"first\":true}");
        assert!(get_stored_response(&conn, "key-1", "reject:biz1").unwrap().is_none());
    }
}
