use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Business, Service, UserCoupon};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub service_id: Option<String>,
    pub business_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<String>,
    pub coupon_code: Option<String>,
}

/// A creation request that passed every check, with the entities it refers to.
#[derive(Debug, Clone)]
pub struct ValidatedBooking {
    pub user_id: String,
    pub service: Service,
    pub business: Business,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub redemption: Option<UserCoupon>,
}

pub const INVALID_COUPON: &str = "invalid or already used coupon";

/// Read-only: nothing is written whether this succeeds or not.
pub fn validate_create_request(
    conn: &Connection,
    user_id: &str,
    req: &CreateBookingRequest,
    now: &DateTime<Utc>,
) -> Result<ValidatedBooking, AppError> {
    let fields = [
        ("serviceId", present(&req.service_id)),
        ("businessId", present(&req.business_id)),
        ("startTime", present(&req.start_time)),
        ("endTime", present(&req.end_time)),
    ];
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    // All four are present past this point
    let [service_id, business_id, start_raw, end_raw] = fields.map(|(_, v)| v.unwrap_or_default());

    let (start_time, end_time) = parse_time_range(start_raw, end_raw)?;

    let service = queries::get_service(conn, service_id)?
        .ok_or_else(|| AppError::NotFound(format!("service not found: {service_id}")))?;
    if service.business_id != business_id {
        tracing::warn!(
            user_id,
            service_id,
            business_id,
            owner = %service.business_id,
            "booking request names a service of another business"
        );
        return Err(AppError::Validation(
            "service does not belong to the specified business".to_string(),
        ));
    }

    let business = queries::get_business(conn, business_id)?
        .ok_or_else(|| AppError::NotFound(format!("business not found: {business_id}")))?;

    let redemption = match present(&req.coupon_code) {
        None => None,
        Some(code) => Some(
            queries::find_redeemable_user_coupon(conn, user_id, code, business_id, now)?
                .ok_or_else(|| AppError::Validation(INVALID_COUPON.to_string()))?,
        ),
    };

    let status = match present(&req.status) {
        None => BookingStatus::Pending,
        Some(raw) => match BookingStatus::parse(raw) {
            Some(s @ (BookingStatus::Pending | BookingStatus::Confirmed)) => s,
            _ => return Err(AppError::Validation("invalid status".to_string())),
        },
    };

    Ok(ValidatedBooking {
        user_id: user_id.to_string(),
        service,
        business,
        start_time,
        end_time,
        status,
        redemption,
    })
}

/// Parses both ends and requires `start < end`.
pub fn parse_time_range(
    start_raw: &str,
    end_raw: &str,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let (Some(start), Some(end)) = (parse_request_time(start_raw), parse_request_time(end_raw))
    else {
        return Err(AppError::Validation("invalid date format".to_string()));
    };

    if start >= end {
        return Err(AppError::Validation(
            "start time must be before end time".to_string(),
        ));
    }

    Ok((start, end))
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` read as UTC. Fractional seconds are
/// dropped, since bookings are stored to the second.
pub fn parse_request_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .map(|dt| dt.trunc_subsecs(0))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{ApprovalStatus, Coupon, User};
    use chrono::TimeZone;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_user(
            &conn,
            &User {
                id: "user-1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                role: "CUSTOMER".to_string(),
            },
        )
        .unwrap();
        for id in ["biz1", "biz2"] {
            queries::create_business(
                &conn,
                &Business {
                    id: id.to_string(),
                    name: format!("Salon {id}"),
                    approval_status: ApprovalStatus::Approved,
                },
            )
            .unwrap();
        }
        queries::create_service(
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

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
    }

    fn request() -> CreateBookingRequest {
        CreateBookingRequest {
            service_id: Some("svc1".to_string()),
            business_id: Some("biz1".to_string()),
            start_time: Some("2025-06-01T09:00:00Z".to_string()),
            end_time: Some("2025-06-01T10:00:00Z".to_string()),
            status: None,
            coupon_code: None,
        }
    }

    #[test]
    fn test_valid_request_defaults_to_pending() {
        let conn = setup_db();
        let validated = validate_create_request(&conn, "user-1", &request(), &now()).unwrap();
        assert_eq!(validated.status, BookingStatus::Pending);
        assert_eq!(validated.service.id, "svc1");
        assert_eq!(validated.business.id, "biz1");
        assert!(validated.redemption.is_none());
        assert_eq!(
            validated.start_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_missing_fields_listed_exactly() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            business_id: Some("biz1".to_string()),
            end_time: Some("   ".to_string()),
            ..Default::default()
        };
        match validate_create_request(&conn, "user-1", &req, &now()) {
            Err(AppError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["serviceId", "startTime", "endTime"]);
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_dates_rejected() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            start_time: Some("next tuesday".to_string()),
            ..request()
        };
        let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
        assert_eq!(err.to_string(), "invalid date format");
    }

    #[test]
    fn test_equal_and_inverted_ranges_rejected() {
        let conn = setup_db();
        for end in ["2025-06-01T09:00:00Z", "2025-06-01T08:00:00Z"] {
            let req = CreateBookingRequest {
                end_time: Some(end.to_string()),
                ..request()
            };
            let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
            assert_eq!(err.to_string(), "start time must be before end time");
        }
    }

    #[test]
    fn test_offsets_are_normalised_before_comparison() {
        // 10:30+02:00 is 08:30Z, before the 09:00Z end
        let (start, end) =
            parse_time_range("2025-06-01T10:30:00+02:00", "2025-06-01T09:00:00Z").unwrap();
        assert!(start < end);
    }

    #[test]
    fn test_fractional_seconds_are_dropped() {
        let (start, end) =
            parse_time_range("2025-06-01T09:00:00.750Z", "2025-06-01T10:00:00.250Z").unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());

        // Both ends fall in the same stored second
        let err = parse_time_range("2025-06-01T09:00:00.100Z", "2025-06-01T09:00:00.900Z")
            .unwrap_err();
        assert_eq!(err.to_string(), "start time must be before end time");
    }

    #[test]
    fn test_lookups_run_before_status_check() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            service_id: Some("svc-missing".to_string()),
            status: Some("SHIPPED".to_string()),
            ..request()
        };
        let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_unknown_service_is_not_found() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            service_id: Some("svc-missing".to_string()),
            ..request()
        };
        let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(err.to_string().contains("svc-missing"));
    }

    #[test]
    fn test_service_of_other_business_rejected() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            business_id: Some("biz2".to_string()),
            ..request()
        };
        let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err
            .to_string()
            .contains("does not belong to the specified business"));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let conn = setup_db();
        for status in ["SHIPPED", "COMPLETED"] {
            let req = CreateBookingRequest {
                status: Some(status.to_string()),
                ..request()
            };
            let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
            assert_eq!(err.to_string(), "invalid status");
        }
    }

    #[test]
    fn test_coupon_resolution() {
        let conn = setup_db();
        queries::create_coupon(
            &conn,
            &Coupon {
                id: "cpn-1".to_string(),
                business_id: "biz1".to_string(),
                code: "SUMMER10".to_string(),
                expires_at: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
                usage_count: 0,
            },
        )
        .unwrap();
        queries::create_user_coupon(
            &conn,
            &UserCoupon {
                id: "uc-1".to_string(),
                user_id: "user-1".to_string(),
                coupon_id: "cpn-1".to_string(),
                used_at: None,
            },
        )
        .unwrap();

        let req = CreateBookingRequest {
            coupon_code: Some("SUMMER10".to_string()),
            ..request()
        };
        let validated = validate_create_request(&conn, "user-1", &req, &now()).unwrap();
        assert_eq!(validated.redemption.unwrap().id, "uc-1");

        let req = CreateBookingRequest {
            coupon_code: Some("BOGUS".to_string()),
            ..request()
        };
        let err = validate_create_request(&conn, "user-1", &req, &now()).unwrap_err();
        assert_eq!(err.to_string(), INVALID_COUPON);
    }
}
