//! Payment and reservation storage port.
//!
//! Payment and reservation rows change together: every transition below moves
//! the payment and its reservation in one storage transaction, conditioned on
//! the payment's current status, so the confirmation invariant (a reservation is
//! `confirmed` iff its payment is `captured`) holds under duplicate and
//! concurrent webhook delivery.

use crate::error::StoreError;
use crate::types::{Payment, PaymentId, Reservation, ReservationId, Ticket};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Mark a pending payment captured and confirm its reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    /// Gateway order the capture belongs to
    pub provider_order_id: String,
    /// Gateway payment reference
    pub provider_payment_id: String,
    /// When the capture is applied
    pub at: DateTime<Utc>,
}

/// Mark a pending payment failed and cancel its reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCommand {
    /// Gateway order that failed
    pub provider_order_id: String,
    /// When the failure is applied
    pub at: DateTime<Utc>,
}

/// Mark a captured payment refunded and cancel its reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundCommand {
    /// Gateway payment reference that was refunded
    pub provider_payment_id: String,
    /// When the refund is applied
    pub at: DateTime<Utc>,
}

/// Outcome of a conditional status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The payment moved and its reservation followed.
    Applied {
        /// Payment after the transition
        payment: Payment,
        /// Reservation after the transition
        reservation: Reservation,
        /// Tickets issued by this transition (ticket orders on capture)
        tickets_issued: u32,
        /// Tickets voided by this transition (ticket orders on refund)
        tickets_voided: u32,
    },
    /// The payment was not in a state this transition applies to.
    Unchanged {
        /// Payment as currently stored
        payment: Payment,
    },
    /// No payment matches the provider reference.
    UnknownPayment,
}

/// Storage for payments, reservations and issued tickets.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Persist a new payment and the reservation it pays for, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the provider order id or reservation
    /// already exists, [`StoreError::Database`] on other failures.
    async fn record_checkout(
        &self,
        payment: &Payment,
        reservation: &Reservation,
    ) -> Result<(), StoreError>;

    /// Load a payment by local id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError>;

    /// Load a reservation with its line items.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError>;

    /// `pending → captured`; reservation `pending → confirmed`. Ticket orders get
    /// one ticket per purchased unit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails; nothing is applied then.
    async fn capture_payment(&self, command: &CaptureCommand) -> Result<Transition, StoreError>;

    /// `pending → failed`; reservation `pending → cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails; nothing is applied then.
    async fn fail_payment(&self, command: &FailureCommand) -> Result<Transition, StoreError>;

    /// `captured → refunded`; reservation `confirmed → cancelled`. Tickets issued
    /// at capture are voided in the same transaction, since the released units
    /// can be sold again.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails; nothing is applied then.
    async fn refund_payment(&self, command: &RefundCommand) -> Result<Transition, StoreError>;

    /// Valid (not voided) tickets of a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn tickets(&self, reservation_id: ReservationId) -> Result<Vec<Ticket>, StoreError>;

    /// Cheap connectivity check for readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage is unreachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
