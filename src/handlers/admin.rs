use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use super::{error_response, with_db};
use crate::auth::{authenticate, Role};
use crate::models::ApprovalStatus;
use crate::services::approvals;
use crate::state::AppState;

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

async fn decide(
    state: &AppState,
    headers: &HeaderMap,
    route: &str,
    business_id: &str,
    decision: ApprovalStatus,
) -> Response {
    let identity = match authenticate(headers, &state.config.jwt_secret, &[Role::Admin]) {
        Ok(identity) => identity,
        Err(err) => return error_response(state, route, None, err).await,
    };

    let key = idempotency_key(headers);
    let result = with_db(state, |conn| approvals::decide(conn, business_id, decision, key));

    match result {
        Ok(stored) => (
            StatusCode::from_u16(stored.status_code).unwrap_or(StatusCode::OK),
            [(header::CONTENT_TYPE, "application/json")],
            stored.body,
        )
            .into_response(),
        Err(err) => error_response(state, route, Some(&identity.user_id), err).await,
    }
}

// POST /api/admin/businesses/:id/approve
pub async fn approve_business(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    decide(
        &state,
        &headers,
        "POST /api/admin/businesses/:id/approve",
        &id,
        ApprovalStatus::Approved,
    )
    .await
}

// POST /api/admin/businesses/:id/reject
pub async fn reject_business(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    decide(
        &state,
        &headers,
        "POST /api/admin/businesses/:id/reject",
        &id,
        ApprovalStatus::Rejected,
    )
    .await
}
