//! # Marketplace Core
//!
//! Domain types, error taxonomy and ports for the marketplace payment-and-inventory
//! reconciliation subsystem.
//!
//! ## Core Concepts
//!
//! - **Inventory unit**: a finite capacity counter (time slot seats on a date, ticket tier stock)
//! - **Payment**: one external payment attempt, linked 1:1 to a reservation
//! - **Reservation**: booking, ticket order or lead unlock, `confirmed` iff its payment is `captured`
//! - **Webhook event**: idempotency ledger entry for an inbound provider callback
//!
//! ## Architecture Principles
//!
//! - Concurrency correctness comes from storage (conditional updates, unique keys),
//!   never from in-process locks: many processes serve the same data.
//! - Every collaborator sits behind a trait in [`ports`] and is injected explicitly.
//! - Request context (who is asking) is passed in, never read from ambient state.

pub mod error;
pub mod ports;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use error::{CheckoutError, GatewayError, StoreError, WebhookError};

/// Environment module - Dependency injection traits
///
/// External dependencies that are not storage or collaborators live here.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use marketplace_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Explicit identity of the caller, resolved by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated user, if any
    pub requestor_id: Option<types::UserId>,
    /// Whether the session layer authenticated the request
    pub is_authenticated: bool,
}

impl RequestContext {
    /// Context for an authenticated user.
    #[must_use]
    pub const fn authenticated(user_id: types::UserId) -> Self {
        Self {
            requestor_id: Some(user_id),
            is_authenticated: true,
        }
    }

    /// Context for an anonymous caller.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            requestor_id: None,
            is_authenticated: false,
        }
    }

    /// The authenticated user id.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Unauthenticated`] for anonymous callers.
    pub fn require_user(&self) -> Result<types::UserId, CheckoutError> {
        match (self.is_authenticated, self.requestor_id) {
            (true, Some(user_id)) => Ok(user_id),
            _ => Err(CheckoutError::Unauthenticated),
        }
    }
}
