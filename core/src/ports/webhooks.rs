//! Webhook idempotency ledger port.

use crate::error::StoreError;
use crate::types::WebhookEventRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of recording an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First delivery of this event id.
    Inserted,
    /// Another delivery already recorded this event id.
    Duplicate,
}

/// Append-only log of inbound provider callbacks, unique by event id.
///
/// Uniqueness must be enforced by storage (primary key / conditional insert);
/// concurrent deliveries of one event id race on [`WebhookEventStore::record`]
/// and exactly one of them sees [`RecordOutcome::Inserted`].
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Look up an event by provider event id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn find(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, StoreError>;

    /// Insert an event unless its id is already present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails for any reason other than a
    /// duplicate id.
    async fn record(&self, event: &WebhookEventRecord) -> Result<RecordOutcome, StoreError>;

    /// Flip `processed` after the business transition succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Recorded events whose transition never completed, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn unprocessed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, StoreError>;
}
