use std::env;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub environment: Environment,
    pub jwt_secret: String,
    pub error_tracker_url: String,
    pub error_tracker_key: String,
    pub payment_gateway_url: String,
    pub payment_gateway_key: String,
    /// Customers cannot cancel or move a booking closer than this to its start.
    pub customer_change_cutoff_minutes: i64,
    pub reminder_lead_minutes: i64,
    pub notifications_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "salonbook.db".to_string()),
            environment: env::var("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Production),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            error_tracker_url: env::var("ERROR_TRACKER_URL").unwrap_or_default(),
            error_tracker_key: env::var("ERROR_TRACKER_KEY").unwrap_or_default(),
            payment_gateway_url: env::var("PAYMENT_GATEWAY_URL").unwrap_or_default(),
            payment_gateway_key: env::var("PAYMENT_GATEWAY_KEY").unwrap_or_default(),
            customer_change_cutoff_minutes: env::var("CUSTOMER_CHANGE_CUTOFF_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            reminder_lead_minutes: env::var("REMINDER_LEAD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            notifications_enabled: env::var("NOTIFICATIONS_ENABLED")
                .map(|v| !matches!(v.as_str(), "false" | "0" | "off"))
                .unwrap_or(true),
        }
    }
}
