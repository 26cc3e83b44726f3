//! Error taxonomy for checkout and reconciliation.
//!
//! Storage and gateway adapters surface [`StoreError`] and [`GatewayError`].
//! The orchestrator translates them into [`CheckoutError`] (user-facing), the
//! reconciler into [`WebhookError`] (provider-facing).

use crate::types::{InventoryUnitId, UnknownVariant};
use thiserror::Error;

/// Errors raised by storage adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database connection or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A uniqueness or integrity constraint rejected the write.
    #[error("Constraint violated: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into a domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<UnknownVariant> for StoreError {
    fn from(err: UnknownVariant) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Errors raised by the payment gateway client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure or timeout talking to the gateway.
    #[error("Gateway unreachable: {0}")]
    Unavailable(String),

    /// The gateway rejected the request.
    #[error("Gateway rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error message from the gateway
        message: String,
    },

    /// The gateway answered with something we could not parse.
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// User-facing purchase failures.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Malformed or ineligible purchase request (400).
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No authenticated requestor (401).
    #[error("Authentication required")]
    Unauthenticated,

    /// Unknown resource or reservation (404).
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of thing that was looked up
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Not enough capacity left (409). Expected under contention.
    #[error("Capacity exceeded for unit {unit_id}: requested {requested}, remaining {remaining}")]
    CapacityExceeded {
        /// Exhausted counter
        unit_id: InventoryUnitId,
        /// Units requested
        requested: u32,
        /// Units left at the time of the attempt
        remaining: u32,
    },

    /// The payment gateway failed; nothing was committed (500).
    #[error("Payment gateway error: {0}")]
    PaymentGateway(#[from] GatewayError),

    /// Storage failure (500).
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CheckoutError {
    /// Shorthand for a validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a missing resource.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// Provider-facing webhook failures.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Missing or wrong signature (400, never retried).
    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(String),

    /// Authentic but unusable payload (400).
    #[error("Malformed webhook payload: {0}")]
    Malformed(String),

    /// A recognised event could not be applied (500, provider redelivers).
    #[error("Reconciliation failed: {0}")]
    Reconciliation(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_error_display() {
        let err = CheckoutError::not_found("Resource", "abc");
        assert_eq!(err.to_string(), "Resource with id abc not found");

        let err = CheckoutError::from(GatewayError::Unavailable("timeout".into()));
        assert_eq!(err.to_string(), "Payment gateway error: Gateway unreachable: timeout");
    }

    #[test]
    fn test_unknown_variant_is_corrupt_record() {
        let err = StoreError::from(UnknownVariant {
            kind: "payment status",
            value: "lost".into(),
        });
        assert_eq!(err, StoreError::Corrupt("unknown payment status: lost".into()));
    }
}
