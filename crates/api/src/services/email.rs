//! Email service for one-time passwords and order notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain text templates.
//! Without an SMTP relay configured, messages are logged and dropped so local
//! development works without mail credentials.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use loomshop_core::OrderId;

use crate::config::EmailConfig;
use crate::services::auth::OTP_TTL_MINUTES;

/// HTML template for the OTP email.
#[derive(Template)]
#[template(path = "email/otp.html")]
struct OtpEmailHtml<'a> {
    name: &'a str,
    otp: &'a str,
    minutes: i64,
}

/// Plain text template for the OTP email.
#[derive(Template)]
#[template(path = "email/otp.txt")]
struct OtpEmailText<'a> {
    name: &'a str,
    otp: &'a str,
    minutes: i64,
}

/// HTML template for the cash-on-delivery confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    name: &'a str,
    order_id: i32,
    total: &'a str,
}

/// Plain text template for the cash-on-delivery confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    name: &'a str,
    order_id: i32,
    total: &'a str,
}

/// HTML template for the payment receipt.
#[derive(Template)]
#[template(path = "email/payment_success.html")]
struct PaymentSuccessHtml<'a> {
    name: &'a str,
    order_id: i32,
    total: &'a str,
}

/// Plain text template for the payment receipt.
#[derive(Template)]
#[template(path = "email/payment_success.txt")]
struct PaymentSuccessText<'a> {
    name: &'a str,
    order_id: i32,
    total: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_name: String,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let mailer = match &config.smtp {
            Some(smtp) => {
                let credentials = Credentials::new(
                    smtp.username.clone(),
                    smtp.password.expose_secret().to_string(),
                );
                Some(
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
                        .port(smtp.port)
                        .credentials(credentials)
                        .build(),
                )
            }
            None => None,
        };

        Ok(Self {
            mailer,
            from_name: config.from_name.clone(),
            from_address: config.from_address.clone(),
        })
    }

    /// Send a one-time password.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_otp(&self, to: &str, name: &str, otp: &str) -> Result<(), EmailError> {
        let minutes = OTP_TTL_MINUTES;
        let html = OtpEmailHtml { name, otp, minutes }.render()?;
        let text = OtpEmailText { name, otp, minutes }.render()?;

        self.send_multipart_email(to, "Your One-Time Password", &text, &html)
            .await
    }

    /// Confirm a cash-on-delivery order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        name: &str,
        order_id: OrderId,
        total: Decimal,
    ) -> Result<(), EmailError> {
        let total = format_rupees(total);
        let order_id = order_id.as_i32();
        let html = OrderConfirmationHtml {
            name,
            order_id,
            total: &total,
        }
        .render()?;
        let text = OrderConfirmationText {
            name,
            order_id,
            total: &total,
        }
        .render()?;

        self.send_multipart_email(to, &format!("Order #{order_id} placed"), &text, &html)
            .await
    }

    /// Confirm a captured online payment.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_payment_success(
        &self,
        to: &str,
        name: &str,
        order_id: OrderId,
        total: Decimal,
    ) -> Result<(), EmailError> {
        let total = format_rupees(total);
        let order_id = order_id.as_i32();
        let html = PaymentSuccessHtml {
            name,
            order_id,
            total: &total,
        }
        .render()?;
        let text = PaymentSuccessText {
            name,
            order_id,
            total: &total,
        }
        .render()?;

        self.send_multipart_email(to, "Payment Successful", &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let from = Mailbox::new(
            Some(self.from_name.clone()),
            self.from_address
                .parse()
                .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
        );

        let email = Message::builder()
            .from(from)
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %subject, "SMTP not configured, email dropped");
            return Ok(());
        };

        mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

/// Format a rupee amount for display, e.g. `₹1299.00`.
fn format_rupees(amount: Decimal) -> String {
    format!("₹{:.2}", amount.round_dp(2))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;

    fn unconfigured() -> EmailService {
        EmailService::new(&EmailConfig {
            smtp: None,
            from_name: "Clothing Brand".to_string(),
            from_address: "noreply@clothingbrand.com".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(Decimal::new(129_900, 2)), "₹1299.00");
        assert_eq!(format_rupees(Decimal::from(5)), "₹5.00");
    }

    #[test]
    fn test_otp_templates_render_code() {
        let html = OtpEmailHtml {
            name: "Meera",
            otp: "482913",
            minutes: 10,
        }
        .render()
        .unwrap();
        let text = OtpEmailText {
            name: "Meera",
            otp: "482913",
            minutes: 10,
        }
        .render()
        .unwrap();

        assert!(html.contains("482913"));
        assert!(text.contains("482913"));
        assert!(text.contains("10 minutes"));
    }

    #[test]
    fn test_payment_templates_render_order() {
        let text = PaymentSuccessText {
            name: "Meera",
            order_id: 42,
            total: "₹1299.00",
        }
        .render()
        .unwrap();
        assert!(text.contains("#42"));
        assert!(text.contains("₹1299.00"));
    }

    #[test]
    fn test_html_escapes_name() {
        let html = OrderConfirmationHtml {
            name: "<b>Meera</b>",
            order_id: 1,
            total: "₹1.00",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Meera</b>"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_drops_mail() {
        let service = unconfigured();
        assert!(
            service
                .send_otp("meera@example.com", "Meera", "482913")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let service = unconfigured();
        let result = service.send_otp("not-an-address", "Meera", "482913").await;
        assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
    }
}
