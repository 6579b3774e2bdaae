pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/users/bookings",
            get(handlers::users::list_bookings).post(handlers::users::create_booking),
        )
        .route(
            "/api/users/bookings/:id/cancel",
            post(handlers::users::cancel_booking),
        )
        .route(
            "/api/users/bookings/:id/reschedule",
            post(handlers::users::reschedule_booking),
        )
        .route(
            "/api/users/notifications",
            get(handlers::users::get_notifications),
        )
        .route(
            "/api/manager/bookings/:id/cancel",
            post(handlers::manager::cancel_booking),
        )
        .route(
            "/api/manager/bookings/:id/reschedule",
            post(handlers::manager::reschedule_booking),
        )
        .route(
            "/api/manager/bookings/:id/reassign",
            post(handlers::manager::reassign_booking),
        )
        .route(
            "/api/manager/bookings/:id/confirm",
            post(handlers::manager::confirm_booking),
        )
        .route(
            "/api/manager/bookings/:id/complete",
            post(handlers::manager::complete_booking),
        )
        .route(
            "/api/manager/bookings/:id/no-show",
            post(handlers::manager::mark_no_show),
        )
        .route(
            "/api/admin/businesses/:id/approve",
            post(handlers::admin::approve_business),
        )
        .route(
            "/api/admin/businesses/:id/reject",
            post(handlers::admin::reject_business),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
