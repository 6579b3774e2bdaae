use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceImage {
    pub id: String,
    pub service_id: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
