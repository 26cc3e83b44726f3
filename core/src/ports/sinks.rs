//! Fire-and-forget side effects: notifications and audit trail.
//!
//! Failures here never abort a purchase or a reconciliation; callers log them
//! and move on.

use crate::types::{ReservationId, ReservationKind, UserId, VendorId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Delivery failure of a sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Sink unavailable: {0}")]
pub struct SinkError(pub String);

/// Something the purchaser and vendor should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Payment captured, reservation confirmed.
    ReservationConfirmed {
        /// Reservation id
        reservation_id: ReservationId,
        /// Vertical
        kind: ReservationKind,
        /// Purchaser
        user_id: UserId,
        /// Vendor
        vendor_id: VendorId,
    },
    /// Payment failed or refunded, reservation cancelled.
    ReservationCancelled {
        /// Reservation id
        reservation_id: ReservationId,
        /// Vertical
        kind: ReservationKind,
        /// Purchaser
        user_id: UserId,
        /// Why it was cancelled
        reason: String,
    },
}

impl Notification {
    /// Reservation the notification is about.
    #[must_use]
    pub const fn reservation_id(&self) -> ReservationId {
        match self {
            Self::ReservationConfirmed { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id, .. } => *reservation_id,
        }
    }
}

/// Sends notifications (e-mail, push, in-app).
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Hand a notification to the delivery channel.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the channel refused it.
    async fn dispatch(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// One audit trail line.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// What happened (e.g. `payment.captured`)
    pub action: String,
    /// What it happened to (e.g. a payment id)
    pub subject: String,
    /// Structured detail
    pub detail: serde_json::Value,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Best-effort audit trail writer.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the entry could not be written.
    async fn record(&self, entry: &AuditEntry) -> Result<(), SinkError>;
}
