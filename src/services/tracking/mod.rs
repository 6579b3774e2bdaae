pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Environment;

/// An unexpected failure forwarded to the external error tracker.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedError {
    pub message: String,
    pub chain: Vec<String>,
    pub route: String,
    pub user_id: Option<String>,
    pub environment: &'static str,
}

impl TrackedError {
    pub fn from_anyhow(
        err: &anyhow::Error,
        route: &str,
        user_id: Option<&str>,
        environment: Environment,
    ) -> Self {
        Self {
            message: err.to_string(),
            chain: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
            route: route.to_string(),
            user_id: user_id.map(str::to_string),
            environment: environment.as_str(),
        }
    }
}

/// Fire-and-forget sink; callers log delivery failures and move on.
#[async_trait]
pub trait ErrorTracker: Send + Sync {
    async fn capture(&self, event: &TrackedError) -> anyhow::Result<()>;
}

/// Used when no tracker endpoint is configured.
pub struct LogErrorTracker;

#[async_trait]
impl ErrorTracker for LogErrorTracker {
    async fn capture(&self, event: &TrackedError) -> anyhow::Result<()> {
        tracing::error!(
            route = %event.route,
            user_id = event.user_id.as_deref().unwrap_or("-"),
            causes = ?event.chain,
            "unexpected error: {}",
            event.message
        );
        Ok(())
    }
}
