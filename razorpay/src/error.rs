//! Error types for the Razorpay client

use thiserror::Error;

/// Configuration errors when building a client from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RazorpayError {
    /// Key id or key secret missing or empty
    #[error("Missing RAZORPAY_KEY_ID or RAZORPAY_KEY_SECRET environment variable")]
    MissingCredentials,
}
