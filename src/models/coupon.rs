use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: String,
    pub business_id: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub usage_count: i64,
}

/// A coupon handed to one user. Consumed at most once, by the booking that redeems it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCoupon {
    pub id: String,
    pub user_id: String,
    pub coupon_id: String,
    pub used_at: Option<DateTime<Utc>>,
}
