//! Fire-and-forget customer notifications.
//!
//! Each send runs on its own task. A failed delivery is logged and never
//! reaches the request that triggered it: the order or OTP it describes is
//! already committed.

use rust_decimal::Decimal;

use loomshop_core::OrderId;

use super::auth::OTP_TTL_MINUTES;
use super::{EmailService, SmsClient};
use crate::db::PaymentCapture;

/// Notification dispatcher.
#[derive(Clone)]
pub struct Notifier {
    email: EmailService,
    sms: Option<SmsClient>,
}

impl Notifier {
    /// Create a notifier. SMS is skipped when no client is given.
    #[must_use]
    pub const fn new(email: EmailService, sms: Option<SmsClient>) -> Self {
        Self { email, sms }
    }

    /// Deliver an OTP by email, and by SMS when the account has a mobile number.
    pub fn otp(&self, email: &str, name: &str, mobile: Option<&str>, otp: &str) {
        let mailer = self.email.clone();
        let (to, name_owned, code) = (email.to_owned(), name.to_owned(), otp.to_owned());
        tokio::spawn(async move {
            if let Err(e) = mailer.send_otp(&to, &name_owned, &code).await {
                tracing::warn!(error = %e, to = %to, "Failed to email OTP");
            }
        });

        if let (Some(sms), Some(mobile)) = (self.sms.clone(), mobile) {
            let (phone, code) = (mobile.to_owned(), otp.to_owned());
            tokio::spawn(async move {
                if let Err(e) = sms.send_otp(&phone, &code, OTP_TTL_MINUTES).await {
                    tracing::warn!(error = %e, phone = %phone, "Failed to text OTP");
                }
            });
        }
    }

    /// Confirm a cash-on-delivery order.
    pub fn order_placed(&self, email: &str, name: &str, order_id: OrderId, total: Decimal) {
        let mailer = self.email.clone();
        let (to, name) = (email.to_owned(), name.to_owned());
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_order_confirmation(&to, &name, order_id, total)
                .await
            {
                tracing::warn!(error = %e, %order_id, "Failed to send order confirmation");
            }
        });
    }

    /// Send the receipt for a captured payment.
    pub fn payment_captured(&self, capture: &PaymentCapture) {
        let mailer = self.email.clone();
        let capture = capture.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer
                .send_payment_success(
                    &capture.customer_email,
                    &capture.customer_name,
                    capture.order_id,
                    capture.total_amount,
                )
                .await
            {
                tracing::warn!(
                    error = %e,
                    order_id = %capture.order_id,
                    "Failed to send payment receipt"
                );
            }
        });
    }
}
