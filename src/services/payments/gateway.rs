use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{PaymentGateway, RefundReceipt};

pub struct HttpPaymentGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn request_refund(
        &self,
        payment_id: &str,
        booking_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<RefundReceipt> {
        anyhow::ensure!(!self.base_url.is_empty(), "payment gateway is not configured");

        let url = format!("{}/refunds", self.base_url.trim_end_matches('/'));
        let body = json!({
            "payment_id": payment_id,
            "amount_cents": amount_cents,
            "metadata": { "booking_id": booking_id },
        });

        let receipt = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", format!("refund-{booking_id}"))
            .json(&body)
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected refund")?
            .json::<RefundReceipt>()
            .await
            .context("failed to parse refund receipt")?;

        Ok(receipt)
    }
}
