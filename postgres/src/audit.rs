//! Append-only audit trail in `audit_log`.

use crate::PostgresStore;
use async_trait::async_trait;
use marketplace_core::ports::{AuditEntry, AuditLog, SinkError};

#[async_trait]
impl AuditLog for PostgresStore {
    async fn record(&self, entry: &AuditEntry) -> Result<(), SinkError> {
        sqlx::query("INSERT INTO audit_log (action, subject, detail, at) VALUES ($1, $2, $3, $4)")
            .bind(&entry.action)
            .bind(&entry.subject)
            .bind(&entry.detail)
            .bind(entry.at)
            .execute(self.pool())
            .await
            .map_err(|e| SinkError(format!("Failed to write audit entry: {e}")))?;
        Ok(())
    }
}
