//! Webhook idempotency ledger over `payment_webhook_events`.

use crate::{PostgresStore, db_error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace_core::StoreError;
use marketplace_core::ports::{RecordOutcome, WebhookEventStore};
use marketplace_core::types::{PaymentProvider, WebhookEventRecord};

type EventRow = (
    String,
    String,
    String,
    serde_json::Value,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const SELECT_EVENT: &str = "SELECT event_id, provider, event_type, payload, processed, \
     received_at, processed_at FROM payment_webhook_events";

fn event_from_row(
    (event_id, provider, event_type, payload, processed, received_at, processed_at): EventRow,
) -> Result<WebhookEventRecord, StoreError> {
    Ok(WebhookEventRecord {
        event_id,
        provider: PaymentProvider::parse(&provider)?,
        event_type,
        payload,
        processed,
        received_at,
        processed_at,
    })
}

#[async_trait]
impl WebhookEventStore for PostgresStore {
    async fn find(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, StoreError> {
        let row: Option<EventRow> = sqlx::query_as(&format!("{SELECT_EVENT} WHERE event_id = $1"))
            .bind(event_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_error("Failed to load webhook event"))?;

        row.map(event_from_row).transpose()
    }

    async fn record(&self, event: &WebhookEventRecord) -> Result<RecordOutcome, StoreError> {
        let inserted: Option<(String,)> = sqlx::query_as(
            "INSERT INTO payment_webhook_events
                 (event_id, provider, event_type, payload, processed, received_at, processed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (event_id) DO NOTHING
             RETURNING event_id",
        )
        .bind(&event.event_id)
        .bind(event.provider.as_str())
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.processed)
        .bind(event.received_at)
        .bind(event.processed_at)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to record webhook event"))?;

        Ok(if inserted.is_some() {
            RecordOutcome::Inserted
        } else {
            RecordOutcome::Duplicate
        })
    }

    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE payment_webhook_events
             SET processed = TRUE, processed_at = $2
             WHERE event_id = $1 AND NOT processed",
        )
        .bind(event_id)
        .bind(at)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to mark webhook event processed"))?;

        Ok(())
    }

    async fn unprocessed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, StoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "{SELECT_EVENT} WHERE NOT processed ORDER BY received_at, event_id LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to list unprocessed webhook events"))?;

        rows.into_iter().map(event_from_row).collect()
    }
}
