//! # Razorpay Payment Gateway
//!
//! Client for the Razorpay Orders API and verifier for Razorpay webhooks,
//! implementing the `PaymentGateway` and `WebhookVerifier` ports of
//! `marketplace-core`.
//!
//! ## Example
//!
//! ```no_run
//! use marketplace_razorpay::{RazorpayClient, RazorpayWebhooks};
//! use marketplace_core::ports::{OrderRequest, PaymentGateway};
//! use marketplace_core::types::{Currency, Money};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from RAZORPAY_KEY_ID / RAZORPAY_KEY_SECRET
//!     let client = RazorpayClient::from_env()?;
//!
//!     let order = client
//!         .create_order(&OrderRequest {
//!             amount: Money::from_minor(5_000, Currency::inr()),
//!             receipt: "booking-42".to_string(),
//!             notes: Default::default(),
//!         })
//!         .await?;
//!     println!("Created {}", order.order_id);
//!
//!     let _webhooks = RazorpayWebhooks::new(std::env::var("RAZORPAY_WEBHOOK_SECRET").ok());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod types;
pub mod webhooks;

// Re-export main types for convenience
pub use client::{DEFAULT_API_URL, RazorpayClient};
pub use error::RazorpayError;
pub use webhooks::{EVENT_ID_HEADER, RazorpayWebhooks, SIGNATURE_HEADER, signature_for};
