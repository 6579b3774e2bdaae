use anyhow::Context;
use async_trait::async_trait;

use super::{ErrorTracker, TrackedError};

pub struct HttpErrorTracker {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpErrorTracker {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ErrorTracker for HttpErrorTracker {
    async fn capture(&self, event: &TrackedError) -> anyhow::Result<()> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        request
            .send()
            .await
            .context("failed to reach error tracker")?
            .error_for_status()
            .context("error tracker rejected event")?;

        Ok(())
    }
}
