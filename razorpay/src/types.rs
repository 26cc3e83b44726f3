//! Wire types for the Razorpay Orders API and webhook payloads

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /orders`
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CreateOrder {
    /// Amount in minor units (paise)
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Merchant receipt reference, at most 40 characters
    pub receipt: String,
    /// Key/value notes echoed back in webhooks
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<String, String>,
}

/// Order as returned by the Orders API
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Order {
    /// Order id (`order_...`)
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// `created`, `attempted` or `paid`
    #[serde(default)]
    pub status: String,
}

/// Error envelope returned with 4xx/5xx responses
#[derive(Clone, Debug, Deserialize)]
pub struct ErrorEnvelope {
    /// Error detail
    pub error: ErrorBody,
}

/// Error detail
#[derive(Clone, Debug, Deserialize)]
pub struct ErrorBody {
    /// Machine readable code, e.g. `BAD_REQUEST_ERROR`
    #[serde(default)]
    pub code: String,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

/// `payload.payment.entity` of a webhook
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentEntity {
    /// Payment id (`pay_...`)
    pub id: String,
    /// Order the payment belongs to
    pub order_id: Option<String>,
    /// Failure reason on `payment.failed`
    pub error_description: Option<String>,
}

/// `payload.order.entity` of a webhook
#[derive(Clone, Debug, Deserialize)]
pub struct OrderEntity {
    /// Order id
    pub id: String,
}

/// `payload.refund.entity` of a webhook
#[derive(Clone, Debug, Deserialize)]
pub struct RefundEntity {
    /// Refund id (`rfnd_...`)
    pub id: String,
    /// Refunded payment
    pub payment_id: String,
}
