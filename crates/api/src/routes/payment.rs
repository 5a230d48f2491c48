//! Payment gateway route handlers.
//!
//! The webhook is the only thing that moves an online order out of
//! `PENDING`. Browser-side verification just tells the checkout page whether
//! the signature it was handed is genuine.
//!
//! The gateway retries a delivery until it sees a 2xx, so the same event can
//! arrive many times. Status changes are conditional on the order still being
//! `PENDING`, which makes every repeat a no-op.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::payment::{verify_payment_signature, verify_webhook_signature};
use crate::state::AppState;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Checkout verification body, as posted by the gateway's browser widget.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub razorpay_order_id: String,
    #[serde(default)]
    pub razorpay_payment_id: String,
    #[serde(default)]
    pub razorpay_signature: String,
}

/// Successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
}

impl WebhookEvent {
    /// `(gateway order ID, payment ID)` of the payment the event is about.
    fn payment(&self) -> Option<(&str, &str)> {
        let entity = &self.payload.as_ref()?.payment.as_ref()?.entity;
        Some((entity.order_id.as_deref()?, entity.id.as_str()))
    }
}

/// Check the signature the checkout widget returned.
///
/// POST /api/payment/verify
///
/// Does not touch the order; the webhook records the payment.
#[instrument(skip(state, user, body), fields(user_id = %user.id, gateway_order_id = %body.razorpay_order_id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let razorpay = state
        .razorpay()
        .ok_or_else(|| AppError::BadRequest("Online payment is not available".to_string()))?;

    let valid = verify_payment_signature(
        razorpay.key_secret().expose_secret(),
        &body.razorpay_order_id,
        &body.razorpay_payment_id,
        &body.razorpay_signature,
    );
    if !valid {
        tracing::warn!("Checkout signature mismatch");
        return Err(AppError::BadRequest("Invalid payment signature".to_string()));
    }

    Ok(Json(VerifyResponse {
        success: true,
        razorpay_order_id: body.razorpay_order_id,
        razorpay_payment_id: body.razorpay_payment_id,
    }))
}

/// Receive a gateway event.
///
/// POST /api/payment/webhook
///
/// The signature covers the raw bytes, so the body is only parsed after it
/// has been checked. A database failure answers 500 so the gateway retries.
#[instrument(skip(state, headers, body), fields(event = tracing::field::Empty))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let Some(secret) = state.config().razorpay_webhook_secret.as_ref() else {
        tracing::warn!("Webhook received but no webhook secret is configured");
        return Err(AppError::BadRequest("Webhook not configured".to_string()));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing webhook signature".to_string()))?;

    if !verify_webhook_signature(secret.expose_secret(), &body, signature) {
        tracing::warn!("Webhook signature mismatch");
        return Err(AppError::BadRequest("Invalid webhook signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Malformed webhook payload".to_string()))?;
    tracing::Span::current().record("event", event.event.as_str());

    let orders = OrderRepository::new(state.pool());
    match event.event.as_str() {
        "payment.captured" => {
            let Some((gateway_order_id, payment_id)) = event.payment() else {
                tracing::warn!("Captured payment without an order reference");
                return Ok(Json(WebhookAck { success: true }));
            };
            match orders.mark_paid(gateway_order_id, payment_id).await? {
                Some(capture) => {
                    tracing::info!(
                        order_id = %capture.order_id,
                        gateway_order_id,
                        payment_id,
                        "Payment captured"
                    );
                    state.notifier().payment_captured(&capture);
                }
                None => {
                    tracing::info!(gateway_order_id, "No pending order for capture, ignoring");
                }
            }
        }
        "payment.failed" => {
            if let Some((gateway_order_id, _)) = event.payment() {
                let updated = orders.mark_failed(gateway_order_id).await?;
                tracing::info!(gateway_order_id, updated, "Payment failed");
            }
        }
        other => {
            tracing::debug!(event = other, "Ignoring webhook event");
        }
    }

    Ok(Json(WebhookAck { success: true }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_event_payment_reference() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "entity": "event",
                "event": "payment.captured",
                "payload": {
                    "payment": {
                        "entity": {
                            "id": "pay_Px9",
                            "order_id": "order_Nx1",
                            "amount": 129900,
                            "status": "captured"
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(event.event, "payment.captured");
        assert_eq!(event.payment(), Some(("order_Nx1", "pay_Px9")));
    }

    #[test]
    fn test_event_without_payment() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"event":"order.paid","payload":{}}"#).unwrap();
        assert!(event.payment().is_none());

        let event: WebhookEvent = serde_json::from_str(r#"{"event":"refund.created"}"#).unwrap();
        assert!(event.payment().is_none());
    }

    #[test]
    fn test_payment_without_order_id() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event":"payment.failed","payload":{"payment":{"entity":{"id":"pay_1","order_id":null}}}}"#,
        )
        .unwrap();
        assert!(event.payment().is_none());
    }

    #[test]
    fn test_verify_response_shape() {
        let json = serde_json::to_value(VerifyResponse {
            success: true,
            razorpay_order_id: "order_Nx1".to_string(),
            razorpay_payment_id: "pay_Px9".to_string(),
        })
        .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["razorpay_order_id"], "order_Nx1");
        assert_eq!(json["razorpay_payment_id"], "pay_Px9");
    }
}
