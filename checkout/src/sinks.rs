//! Notification and audit side effects.
//!
//! Delivery (e-mail, push) lives outside this service; [`TracingNotifier`]
//! logs what would be sent. Both helpers below swallow sink failures after
//! logging them, so a broken sink never aborts a purchase or a webhook.

use async_trait::async_trait;
use marketplace_core::ports::{
    AuditEntry, AuditLog, Notification, NotificationDispatcher, SinkError,
};

/// Dispatcher that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationDispatcher for TracingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), SinkError> {
        match notification {
            Notification::ReservationConfirmed {
                reservation_id,
                kind,
                user_id,
                vendor_id,
            } => tracing::info!(
                %reservation_id,
                %kind,
                %user_id,
                %vendor_id,
                "Notify: reservation confirmed"
            ),
            Notification::ReservationCancelled {
                reservation_id,
                kind,
                user_id,
                reason,
            } => tracing::info!(
                %reservation_id,
                %kind,
                %user_id,
                reason = %reason,
                "Notify: reservation cancelled"
            ),
        }
        Ok(())
    }
}

/// Dispatch a notification, logging (not returning) failures.
pub(crate) async fn notify(notifier: &dyn NotificationDispatcher, notification: Notification) {
    if let Err(e) = notifier.dispatch(&notification).await {
        tracing::warn!(
            reservation_id = %notification.reservation_id(),
            error = %e,
            "Notification dispatch failed"
        );
    }
}

/// Append to the audit log, logging (not returning) failures.
pub(crate) async fn audit(log: &dyn AuditLog, entry: AuditEntry) {
    if let Err(e) = log.record(&entry).await {
        tracing::warn!(
            action = %entry.action,
            subject = %entry.subject,
            error = %e,
            "Audit log write failed"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::environment::Clock;
    use marketplace_core::types::{ReservationId, ReservationKind, UserId, VendorId};
    use marketplace_testing::{RecordingAuditLog, RecordingNotifier, test_clock};

    fn confirmed() -> Notification {
        Notification::ReservationConfirmed {
            reservation_id: ReservationId::new(),
            kind: ReservationKind::Booking,
            user_id: UserId::new(),
            vendor_id: VendorId::new(),
        }
    }

    #[tokio::test]
    async fn test_tracing_notifier_accepts_everything() {
        assert!(TracingNotifier.dispatch(&confirmed()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_notifier_is_swallowed() {
        let notifier = RecordingNotifier::failing();
        notify(&notifier, confirmed()).await;
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_records_entry() {
        let log = RecordingAuditLog::new();
        audit(
            &log,
            AuditEntry {
                action: "payment.captured".into(),
                subject: "pay_1".into(),
                detail: serde_json::json!({}),
                at: test_clock().now(),
            },
        )
        .await;
        assert_eq!(log.actions("payment.captured").len(), 1);
    }
}
