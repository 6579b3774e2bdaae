pub mod gateway;

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RefundReceipt {
    pub reference: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Asks the provider to refund a captured payment. Returns once the request is accepted.
    async fn request_refund(
        &self,
        payment_id: &str,
        booking_id: &str,
        amount_cents: i64,
    ) -> anyhow::Result<RefundReceipt>;
}
