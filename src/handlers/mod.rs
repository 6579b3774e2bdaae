pub mod admin;
pub mod health;
pub mod manager;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::response::Response;
use axum::Json;
use rusqlite::Connection;

use crate::errors::{classify_storage_error, AppError};
use crate::services::tracking::TrackedError;
use crate::state::AppState;

/// Logs or reports the failure, then renders it for the configured environment.
pub(crate) async fn error_response(
    state: &AppState,
    route: &str,
    user_id: Option<&str>,
    err: AppError,
) -> Response {
    match &err {
        AppError::Internal(inner) => match classify_storage_error(inner) {
            Some(fault) => tracing::error!(
                route,
                user_id = user_id.unwrap_or("-"),
                code = %fault.code,
                category = fault.category.as_str(),
                details = %fault.details,
                "storage error"
            ),
            None => {
                let event =
                    TrackedError::from_anyhow(inner, route, user_id, state.config.environment);
                if let Err(e) = state.tracker.capture(&event).await {
                    tracing::warn!(route, error = %e, "failed to report error");
                }
            }
        },
        AppError::Gateway(inner) => {
            tracing::warn!(route, error = %inner, "payment gateway failure");
        }
        other => {
            tracing::debug!(route, status = %other.status(), error = %other, "request rejected");
        }
    }

    err.render(state.config.environment)
}

/// Runs `f` with the connection locked. The lock is released before returning.
pub(crate) fn with_db<T>(
    state: &AppState,
    f: impl FnOnce(&mut Connection) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let mut db = state.db()?;
    f(&mut db)
}

pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!(error = %e, "rejected request body");
        AppError::Validation("invalid request body".to_string())
    })
}
