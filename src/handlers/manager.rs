use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};

use super::{error_response, parse_body, with_db};
use crate::auth::{authenticate, Role};
use crate::errors::AppError;
use crate::models::{BookingDetails, BookingStatus, BookingView};
use crate::services::lifecycle::{self, Actor, ReassignRequest, RescheduleRequest};
use crate::state::AppState;

fn manager(state: &AppState, headers: &HeaderMap) -> Result<Actor, AppError> {
    let identity = authenticate(headers, &state.config.jwt_secret, Role::MANAGEMENT)?;
    Actor::from_identity(&identity)
}

async fn respond(
    state: &AppState,
    route: &str,
    actor: &Actor,
    result: Result<BookingDetails, AppError>,
) -> Response {
    match result {
        Ok(details) => Json(BookingView::from(details)).into_response(),
        Err(err) => error_response(state, route, Some(actor.user_id()), err).await,
    }
}

// POST /api/manager/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let route = "POST /api/manager/bookings/:id/cancel";
    let actor = match manager(&state, &headers) {
        Ok(actor) => actor,
        Err(err) => return error_response(&state, route, None, err).await,
    };

    let result = lifecycle::cancel_booking(Arc::clone(&state), actor.clone(), id).await;
    respond(&state, route, &actor, result).await
}

// POST /api/manager/bookings/:id/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<RescheduleRequest>, JsonRejection>,
) -> Response {
    let route = "POST /api/manager/bookings/:id/reschedule";
    let actor = match manager(&state, &headers) {
        Ok(actor) => actor,
        Err(err) => return error_response(&state, route, None, err).await,
    };
    let cutoff = Duration::minutes(state.config.customer_change_cutoff_minutes);

    let result = parse_body(payload).and_then(|req| {
        with_db(&state, |conn| {
            lifecycle::reschedule_booking(conn, &actor, &id, &req, cutoff, &Utc::now())
        })
    });
    respond(&state, route, &actor, result).await
}

// POST /api/manager/bookings/:id/reassign
pub async fn reassign_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Response {
    let route = "POST /api/manager/bookings/:id/reassign";
    let actor = match manager(&state, &headers) {
        Ok(actor) => actor,
        Err(err) => return error_response(&state, route, None, err).await,
    };

    let result = parse_body(payload).and_then(|req| {
        with_db(&state, |conn| {
            lifecycle::reassign_booking(conn, &actor, &id, &req, &Utc::now())
        })
    });
    respond(&state, route, &actor, result).await
}

async fn change_status(
    state: &AppState,
    headers: &HeaderMap,
    route: &str,
    id: &str,
    next: BookingStatus,
) -> Response {
    let actor = match manager(state, headers) {
        Ok(actor) => actor,
        Err(err) => return error_response(state, route, None, err).await,
    };

    let result = with_db(state, |conn| {
        lifecycle::set_booking_status(conn, &actor, id, next, &Utc::now())
    });
    respond(state, route, &actor, result).await
}

// POST /api/manager/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    change_status(
        &state,
        &headers,
        "POST /api/manager/bookings/:id/confirm",
        &id,
        BookingStatus::Confirmed,
    )
    .await
}

// POST /api/manager/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    change_status(
        &state,
        &headers,
        "POST /api/manager/bookings/:id/complete",
        &id,
        BookingStatus::Completed,
    )
    .await
}

// POST /api/manager/bookings/:id/no-show
pub async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    change_status(
        &state,
        &headers,
        "POST /api/manager/bookings/:id/no-show",
        &id,
        BookingStatus::NoShow,
    )
    .await
}
