use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::BookingView;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingLists {
    pub upcoming_bookings: Vec<BookingView>,
    pub past_bookings: Vec<BookingView>,
}

/// Upcoming means `startTime > now`, past means `endTime < now`. A booking in
/// progress at `now` is in neither list.
pub fn list_bookings(
    conn: &Connection,
    user_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<BookingLists> {
    let upcoming = queries::get_upcoming_bookings(conn, user_id, now)?;
    let past = queries::get_past_bookings(conn, user_id, now)?;

    Ok(BookingLists {
        upcoming_bookings: shape_all(conn, upcoming)?,
        past_bookings: shape_all(conn, past)?,
    })
}

fn shape_all(
    conn: &Connection,
    bookings: Vec<crate::models::Booking>,
) -> anyhow::Result<Vec<BookingView>> {
    bookings
        .into_iter()
        .map(|b| queries::load_booking_details(conn, b).map(BookingView::from))
        .collect()
}
