use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::json;

use super::{error_response, parse_body, with_db};
use crate::auth::{authenticate, Identity, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::BookingView;
use crate::services::booking_executor::execute_booking;
use crate::services::booking_validator::{validate_create_request, CreateBookingRequest};
use crate::services::lifecycle::{self, Actor, RescheduleRequest};
use crate::services::listing;
use crate::state::AppState;

fn customer(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    authenticate(headers, &state.config.jwt_secret, &[Role::Customer])
}

// GET /api/users/bookings
pub async fn list_bookings(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let route = "GET /api/users/bookings";
    let identity = match customer(&state, &headers) {
        Ok(identity) => identity,
        Err(err) => return error_response(&state, route, None, err).await,
    };

    let result = with_db(&state, |conn| {
        Ok(listing::list_bookings(conn, &identity.user_id, &Utc::now())?)
    });

    match result {
        Ok(lists) => Json(lists).into_response(),
        Err(err) => error_response(&state, route, Some(&identity.user_id), err).await,
    }
}

// POST /api/users/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Response {
    let route = "POST /api/users/bookings";
    let identity = match customer(&state, &headers) {
        Ok(identity) => identity,
        Err(err) => return error_response(&state, route, None, err).await,
    };
    let reminder_lead = Duration::minutes(state.config.reminder_lead_minutes);

    let result = parse_body(payload).and_then(|req| {
        with_db(&state, |conn| {
            let now = Utc::now();
            let validated = validate_create_request(conn, &identity.user_id, &req, &now)?;
            execute_booking(conn, validated, reminder_lead, &now)
        })
    });

    match result {
        Ok(details) => (StatusCode::CREATED, Json(BookingView::from(details))).into_response(),
        Err(err) => error_response(&state, route, Some(&identity.user_id), err).await,
    }
}

// POST /api/users/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let route = "POST /api/users/bookings/:id/cancel";
    let identity = match customer(&state, &headers) {
        Ok(identity) => identity,
        Err(err) => return error_response(&state, route, None, err).await,
    };
    let actor = Actor::Customer {
        user_id: identity.user_id.clone(),
    };

    match lifecycle::cancel_booking(Arc::clone(&state), actor, id).await {
        Ok(details) => Json(BookingView::from(details)).into_response(),
        Err(err) => error_response(&state, route, Some(&identity.user_id), err).await,
    }
}

// POST /api/users/bookings/:id/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<RescheduleRequest>, JsonRejection>,
) -> Response {
    let route = "POST /api/users/bookings/:id/reschedule";
    let identity = match customer(&state, &headers) {
        Ok(identity) => identity,
        Err(err) => return error_response(&state, route, None, err).await,
    };
    let actor = Actor::Customer {
        user_id: identity.user_id.clone(),
    };
    let cutoff = Duration::minutes(state.config.customer_change_cutoff_minutes);

    let result = parse_body(payload).and_then(|req| {
        with_db(&state, |conn| {
            lifecycle::reschedule_booking(conn, &actor, &id, &req, cutoff, &Utc::now())
        })
    });

    match result {
        Ok(details) => Json(BookingView::from(details)).into_response(),
        Err(err) => error_response(&state, route, Some(&identity.user_id), err).await,
    }
}

// GET /api/users/notifications
pub async fn get_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let route = "GET /api/users/notifications";
    let identity = match customer(&state, &headers) {
        Ok(identity) => identity,
        Err(err) => return error_response(&state, route, None, err).await,
    };

    let result = if state.config.notifications_enabled {
        with_db(&state, |conn| {
            Ok(queries::get_pending_notifications(conn, &identity.user_id)?)
        })
    } else {
        Err(AppError::Unavailable("notifications unavailable".to_string()))
    };

    match result {
        Ok(notifications) => Json(json!({
            "available": true,
            "notifications": notifications,
        }))
        .into_response(),
        Err(err) => error_response(&state, route, Some(&identity.user_id), err).await,
    }
}
