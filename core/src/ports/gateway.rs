//! Payment gateway port.
//!
//! Abstraction over payment processors (Razorpay, Stripe, ...): order creation on
//! the checkout path and authentication/decoding of asynchronous callbacks on
//! the webhook path.

use crate::error::{GatewayError, WebhookError};
use crate::types::{Money, PaymentProvider};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Order creation request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Amount to collect
    pub amount: Money,
    /// Merchant receipt reference (our reservation id)
    pub receipt: String,
    /// Free-form key/value notes echoed back in callbacks
    pub notes: BTreeMap<String, String>,
}

/// Order as created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    /// Gateway order id
    pub order_id: String,
    /// Amount the gateway will collect, minor units
    pub amount_minor: i64,
}

/// External payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider this gateway talks to.
    fn provider(&self) -> PaymentProvider;

    /// Public key handed to the client-side checkout widget.
    fn checkout_key(&self) -> &str;

    /// Create an order for `request.amount`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway is unreachable, rejects the
    /// request or answers with an unexpected body.
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

/// Normalised meaning of a provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEventKind {
    /// Funds captured for an order.
    PaymentCaptured {
        /// Gateway order id
        order_id: String,
        /// Gateway payment id
        payment_id: String,
    },
    /// Payment attempt for an order failed.
    PaymentFailed {
        /// Gateway order id
        order_id: String,
        /// Provider's failure description
        reason: Option<String>,
    },
    /// Captured payment refunded.
    RefundProcessed {
        /// Gateway payment id
        payment_id: String,
    },
    /// Event type this service does not act on.
    Unrecognized,
}

/// An authenticated, decoded provider callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    /// Provider-assigned unique event id
    pub event_id: String,
    /// Raw event type string
    pub event_type: String,
    /// Normalised meaning
    pub kind: ProviderEventKind,
    /// Parsed payload, stored verbatim in the ledger
    pub payload: serde_json::Value,
}

/// Authenticates and decodes raw webhook deliveries.
pub trait WebhookVerifier: Send + Sync {
    /// Provider whose callbacks this verifier understands.
    fn provider(&self) -> PaymentProvider;

    /// Check `signature` against the raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::SignatureInvalid`] if the signature is missing,
    /// malformed or does not match, or no secret is configured.
    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), WebhookError>;

    /// Decode an authenticated body. `event_id_hint` is the event id transport
    /// header, when the provider sends one.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Malformed`] if the body is not a usable event.
    fn decode(&self, body: &[u8], event_id_hint: Option<&str>)
    -> Result<ProviderEvent, WebhookError>;
}
