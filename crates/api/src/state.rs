//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::{EmailService, Notifier, ProductCache, RazorpayClient, SmsClient, SmsError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid SMS configuration: {0}")]
    Sms(#[from] SmsError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    products: ProductCache,
    notifier: Notifier,
    razorpay: Option<RazorpayClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP or SMS settings are unusable.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, StateError> {
        let email = EmailService::new(&config.email)?;
        let sms = config.sms.as_ref().map(SmsClient::new).transpose()?;
        let razorpay = config.razorpay.as_ref().map(RazorpayClient::new);
        let products = ProductCache::new(config.product_cache_ttl);

        if razorpay.is_none() {
            tracing::warn!("Razorpay not configured, online payment disabled");
        }
        if config.is_production() && config.email.smtp.is_none() {
            tracing::warn!("SMTP not configured in production, customer emails will be dropped");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                products,
                notifier: Notifier::new(email, sms),
                razorpay,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the product listing cache.
    #[must_use]
    pub fn products(&self) -> &ProductCache {
        &self.inner.products
    }

    /// Get a reference to the notification dispatcher.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Get the Razorpay client, if online payment is configured.
    #[must_use]
    pub fn razorpay(&self) -> Option<&RazorpayClient> {
        self.inner.razorpay.as_ref()
    }
}
