//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Password hashing, bearer tokens and one-time passwords
//! - `payment` - Razorpay order creation and signature verification
//! - `email` - Transactional email (OTP, order confirmation, payment receipt)
//! - `sms` - OTP delivery over Fast2SMS
//! - `notify` - Fire-and-forget delivery of the above
//! - `cache` - In-process product listing cache

pub mod auth;
pub mod cache;
pub mod email;
pub mod notify;
pub mod payment;
pub mod sms;

pub use cache::ProductCache;
pub use email::{EmailError, EmailService};
pub use notify::Notifier;
pub use payment::{GatewayOrder, PaymentError, RazorpayClient};
pub use sms::{SmsClient, SmsError};
