use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use salonbook::config::AppConfig;
use salonbook::db;
use salonbook::services::payments::gateway::HttpPaymentGateway;
use salonbook::services::tracking::http::HttpErrorTracker;
use salonbook::services::tracking::{ErrorTracker, LogErrorTracker};
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.jwt_secret == "changeme" && !config.environment.is_development() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let conn = db::init_db(&config.database_url)?;

    let tracker: Box<dyn ErrorTracker> = if config.error_tracker_url.is_empty() {
        tracing::info!("no error tracker configured, logging unexpected errors only");
        Box::new(LogErrorTracker)
    } else {
        tracing::info!("reporting errors to {}", config.error_tracker_url);
        Box::new(HttpErrorTracker::new(
            config.error_tracker_url.clone(),
            config.error_tracker_key.clone(),
        ))
    };

    if config.payment_gateway_url.is_empty() {
        tracing::warn!("PAYMENT_GATEWAY_URL is not set; refunds for app payments will fail");
    }
    let payments = HttpPaymentGateway::new(
        config.payment_gateway_url.clone(),
        config.payment_gateway_key.clone(),
    );

    tracing::info!(environment = config.environment.as_str(), "configuration loaded");

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        tracker,
        payments: Box::new(payments),
    });

    let app = salonbook::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
