//! Razorpay payment gateway.
//!
//! The API only creates gateway orders; the browser collects the payment and
//! Razorpay reports the outcome through a signed webhook (see
//! `routes::payment`). Signature checks live in [`signature`] and need no
//! client.

mod signature;

pub use signature::{constant_time_compare, verify_payment_signature, verify_webhook_signature};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::config::RazorpayConfig;

/// Razorpay REST API base URL.
const BASE_URL: &str = "https://api.razorpay.com/v1";

/// Errors that can occur when talking to Razorpay.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Amount cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    Amount(#[from] loomshop_core::MoneyError),
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// An order created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order ID (`order_...`).
    pub id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self::with_base_url(config, BASE_URL)
    }

    /// Create a client against a different API root.
    #[must_use]
    pub fn with_base_url(config: &RazorpayConfig, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    /// Public key ID the browser checkout is opened with.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Secret used to verify checkout signatures.
    #[must_use]
    pub const fn key_secret(&self) -> &SecretString {
        &self.key_secret
    }

    /// Create a gateway order for `amount` minor units.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the request fails or the response
    /// cannot be decoded, and `PaymentError::Api` for non-success statuses.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let url = format!("{}/orders", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response.json().await?;
        tracing::info!(gateway_order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }
}

/// Receipt reference sent with a gateway order.
#[must_use]
pub fn receipt_for(user_id: loomshop_core::UserId, unix_millis: i64) -> String {
    format!("order_{}_{unix_millis}", user_id.as_i32())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_request_body() {
        let body = serde_json::to_value(CreateOrderRequest {
            amount: 129_900,
            currency: "INR",
            receipt: "order_7_1700000000000",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "amount": 129_900,
                "currency": "INR",
                "receipt": "order_7_1700000000000"
            })
        );
    }

    #[test]
    fn test_gateway_order_ignores_extra_fields() {
        let order: GatewayOrder = serde_json::from_str(
            r#"{
                "id": "order_Nx1",
                "entity": "order",
                "amount": 50000,
                "amount_paid": 0,
                "currency": "INR",
                "receipt": "order_7_1700000000000",
                "status": "created"
            }"#,
        )
        .unwrap();
        assert_eq!(order.id, "order_Nx1");
        assert_eq!(order.amount, 50_000);
        assert_eq!(order.currency, "INR");
    }

    #[test]
    fn test_receipt_format() {
        assert_eq!(
            receipt_for(loomshop_core::UserId::new(7), 1_700_000_000_000),
            "order_7_1700000000000"
        );
    }

    #[test]
    fn test_client_trims_base_url() {
        let config = RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: SecretString::from("secret".to_string()),
        };
        let client = RazorpayClient::with_base_url(&config, "http://localhost:9999/v1/");
        assert_eq!(client.base_url, "http://localhost:9999/v1");
        assert_eq!(client.key_id(), "rzp_test_key");
    }
}
