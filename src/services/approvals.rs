use rusqlite::Connection;
use serde_json::json;

use crate::db::queries::{self, StoredResponse};
use crate::errors::AppError;
use crate::models::ApprovalStatus;

/// Sets a business's approval status. With an idempotency key, the first
/// successful response is stored and every later call with that key gets it back
/// unchanged, even if the business was changed in between.
pub fn decide(
    conn: &Connection,
    business_id: &str,
    decision: ApprovalStatus,
    idempotency_key: Option<&str>,
) -> Result<StoredResponse, AppError> {
    let scope = format!("{}:{business_id}", decision.as_str());

    if let Some(key) = idempotency_key {
        if let Some(stored) = queries::get_stored_response(conn, key, &scope)? {
            tracing::info!(business_id, key, "replaying stored approval response");
            return Ok(stored);
        }
    }

    let mut business = queries::get_business(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business not found: {business_id}")))?;

    queries::set_business_approval(conn, business_id, decision)?;
    let previous = business.approval_status;
    business.approval_status = decision;

    tracing::info!(
        business_id,
        from = previous.as_str(),
        to = decision.as_str(),
        "business approval changed"
    );

    let response = StoredResponse {
        status_code: 200,
        body: json!({
            "business": {
                "id": business.id,
                "name": business.name,
                "approvalStatus": business.approval_status.as_str(),
            }
        })
        .to_string(),
    };

    if let Some(key) = idempotency_key {
        queries::store_response(conn, key, &scope, &response)?;
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Business;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_business(
            &conn,
            &Business {
                id: "biz1".to_string(),
                name: "Shear Genius".to_string(),
                approval_status: ApprovalStatus::Pending,
            },
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_approve_updates_business() {
        let conn = setup_db();
        let response = decide(&conn, "biz1", ApprovalStatus::Approved, None).unwrap();
        assert_eq!(response.status_code, 200);
        assert!(response.body.contains("\"approvalStatus\":\"APPROVED\""));

        let business = queries::get_business(&conn, "biz1").unwrap().unwrap();
        assert_eq!(business.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_same_key_replays_first_response() {
        let conn = setup_db();
        let first = decide(&conn, "biz1", ApprovalStatus::Approved, Some("key-1")).unwrap();

        // Someone else rejects it in between
        decide(&conn, "biz1", ApprovalStatus::Rejected, None).unwrap();

        let replay = decide(&conn, "biz1", ApprovalStatus::Approved, Some("key-1")).unwrap();
        assert_eq!(first, replay);

        let business = queries::get_business(&conn, "biz1").unwrap().unwrap();
        assert_eq!(business.approval_status, ApprovalStatus::Rejected);
    }

    #[test]
    fn test_key_is_scoped_to_decision_and_business() {
        let conn = setup_db();
        decide(&conn, "biz1", ApprovalStatus::Approved, Some("key-1")).unwrap();

        // Same key, different decision: applied, not replayed
        let rejected = decide(&conn, "biz1", ApprovalStatus::Rejected, Some("key-1")).unwrap();
        assert!(rejected.body.contains("\"approvalStatus\":\"REJECTED\""));

        let business = queries::get_business(&conn, "biz1").unwrap().unwrap();
        assert_eq!(business.approval_status, ApprovalStatus::Rejected);
    }

    #[test]
    fn test_unknown_business() {
        let conn = setup_db();
        let err = decide(&conn, "nope", ApprovalStatus::Approved, Some("key-2")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Failures are not stored
        assert!(queries::get_stored_response(&conn, "key-2", "APPROVED:nope")
            .unwrap()
            .is_none());
    }
}
