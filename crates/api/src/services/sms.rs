//! Fast2SMS client for OTP delivery.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::SmsConfig;

/// Fast2SMS bulk endpoint.
const ENDPOINT: &str = "https://www.fast2sms.com/dev/bulkV2";

/// Quick transactional route (no DLT template required).
const QUICK_ROUTE: &str = "q";

/// Errors that can occur when sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// API key is not a valid header value.
    #[error("invalid API key format")]
    InvalidApiKey,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    route: &'a str,
    message: &'a str,
    numbers: &'a str,
}

/// Fast2SMS API client.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
}

impl SmsClient {
    /// Create a new SMS client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| SmsError::InvalidApiKey)?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Send a text message to one number.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it.
    #[instrument(skip(self, message))]
    pub async fn send(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        let response = self
            .client
            .post(ENDPOINT)
            .json(&SendRequest {
                route: QUICK_ROUTE,
                message,
                numbers: phone,
            })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(phone = %phone, "SMS sent");
        Ok(())
    }

    /// Send a one-time password.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it.
    pub async fn send_otp(&self, phone: &str, otp: &str, minutes: i64) -> Result<(), SmsError> {
        self.send(phone, &otp_message(otp, minutes)).await
    }
}

fn otp_message(otp: &str, minutes: i64) -> String {
    format!("Your OTP is {otp}. Valid for {minutes} min.")
}
