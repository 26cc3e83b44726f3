//! Webhook Reconciler.
//!
//! Turns provider callbacks into payment and reservation transitions:
//!
//! ```text
//! RECEIVED -> AUTHENTICATED -> DEDUPED -> DISPATCHED -> {APPLIED, IGNORED}
//! ```
//!
//! The event id is recorded before the transition runs and marked processed
//! only after it succeeded. Exact redeliveries stop at the ledger; distinct
//! events describing the same change (`payment.captured` and `order.paid`)
//! stop at the conditional transition. Events left unprocessed by a failure
//! are picked up by [`WebhookReconciler::replay_unprocessed`].

use crate::ledger::InventoryService;
use crate::{metrics, sinks};
use marketplace_core::environment::Clock;
use marketplace_core::ports::{
    AuditEntry, AuditLog, CaptureCommand, CheckoutStore, FailureCommand, Notification,
    NotificationDispatcher, ProviderEventKind, RecordOutcome, RefundCommand, Transition,
    WebhookEventStore, WebhookVerifier,
};
use marketplace_core::types::{Payment, PaymentStatus, Reservation, WebhookEventRecord};
use marketplace_core::{StoreError, WebhookError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// How a delivery was handled. Every variant is answered with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    /// The event was applied (or found nothing left to change).
    Processed,
    /// The event id was seen before; nothing ran.
    Duplicate,
    /// Event type this service does not act on.
    Ignored,
}

impl WebhookOutcome {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
        }
    }
}

/// Result of a replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events applied and marked processed
    pub processed: usize,
    /// Events that failed again and stay unprocessed
    pub failed: usize,
}

/// Applies authenticated provider callbacks.
#[derive(Clone)]
pub struct WebhookReconciler {
    verifier: Arc<dyn WebhookVerifier>,
    events: Arc<dyn WebhookEventStore>,
    store: Arc<dyn CheckoutStore>,
    inventory: InventoryService,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WebhookReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookReconciler")
            .field("provider", &self.verifier.provider())
            .finish_non_exhaustive()
    }
}

impl WebhookReconciler {
    /// Wire the reconciler.
    #[must_use]
    pub fn new(
        verifier: Arc<dyn WebhookVerifier>,
        events: Arc<dyn WebhookEventStore>,
        store: Arc<dyn CheckoutStore>,
        inventory: InventoryService,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            events,
            store,
            inventory,
            notifier,
            audit,
            clock,
        }
    }

    /// Handle one delivery. `body` must be the raw request bytes.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::SignatureInvalid`]: nothing was recorded
    /// - [`WebhookError::Malformed`]: nothing was recorded
    /// - [`WebhookError::Reconciliation`]: the event stays unprocessed
    #[tracing::instrument(
        skip_all,
        fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty)
    )]
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
        event_id_hint: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let result = self.try_handle(body, signature, event_id_hint).await;
        metrics::record_webhook(match &result {
            Ok(outcome) => outcome.as_str(),
            Err(WebhookError::SignatureInvalid(_)) => "signature_invalid",
            Err(WebhookError::Malformed(_)) => "malformed",
            Err(WebhookError::Reconciliation(_)) => "failed",
        });
        result
    }

    async fn try_handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
        event_id_hint: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        self.verifier.verify(body, signature).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook with invalid signature");
        })?;

        let event = self.verifier.decode(body, event_id_hint).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected malformed webhook");
        })?;
        let span = tracing::Span::current();
        span.record("event_id", event.event_id.as_str());
        span.record("event_type", event.event_type.as_str());

        if self.events.find(&event.event_id).await?.is_some() {
            tracing::debug!("Duplicate delivery, skipping");
            return Ok(WebhookOutcome::Duplicate);
        }

        let record = WebhookEventRecord::received(
            event.event_id.clone(),
            self.verifier.provider(),
            event.event_type.clone(),
            event.payload,
            self.clock.now(),
        );
        if self.events.record(&record).await? == RecordOutcome::Duplicate {
            tracing::debug!("Concurrent duplicate delivery, skipping");
            return Ok(WebhookOutcome::Duplicate);
        }

        let outcome = self.apply(&event.kind).await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to apply webhook event");
        })?;

        self.events.mark_processed(&event.event_id, self.clock.now()).await?;
        tracing::info!(outcome = outcome.as_str(), "Webhook handled");

        Ok(outcome)
    }

    /// Re-apply recorded events whose transition never completed, oldest
    /// first. Transitions are conditional, so replaying an event that did
    /// partly apply is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the unprocessed events cannot be listed.
    /// Failures of individual events are counted, not returned.
    #[tracing::instrument(skip(self))]
    pub async fn replay_unprocessed(&self, limit: u32) -> Result<ReplayReport, StoreError> {
        let mut report = ReplayReport::default();

        for record in self.events.unprocessed(limit).await? {
            match self.replay(&record).await {
                Ok(outcome) => {
                    report.processed += 1;
                    tracing::info!(
                        event_id = %record.event_id,
                        outcome = outcome.as_str(),
                        "Replayed webhook event"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(event_id = %record.event_id, error = %e, "Replay failed");
                }
            }
        }

        Ok(report)
    }

    async fn replay(&self, record: &WebhookEventRecord) -> Result<WebhookOutcome, WebhookError> {
        let body = serde_json::to_vec(&record.payload)
            .map_err(|e| WebhookError::Malformed(format!("stored payload: {e}")))?;
        let event = self.verifier.decode(&body, Some(&record.event_id))?;
        let outcome = self.apply(&event.kind).await?;
        self.events.mark_processed(&record.event_id, self.clock.now()).await?;
        Ok(outcome)
    }

    async fn apply(&self, kind: &ProviderEventKind) -> Result<WebhookOutcome, StoreError> {
        let now = self.clock.now();

        match kind {
            ProviderEventKind::PaymentCaptured {
                order_id,
                payment_id,
            } => {
                let transition = self
                    .store
                    .capture_payment(&CaptureCommand {
                        provider_order_id: order_id.clone(),
                        provider_payment_id: payment_id.clone(),
                        at: now,
                    })
                    .await?;
                self.after_capture(order_id, payment_id, transition).await?;
            }
            ProviderEventKind::PaymentFailed { order_id, reason } => {
                let transition = self
                    .store
                    .fail_payment(&FailureCommand {
                        provider_order_id: order_id.clone(),
                        at: now,
                    })
                    .await?;
                let reason = reason.as_deref().unwrap_or("payment failed");
                self.after_cancel(order_id, reason, transition).await?;
            }
            ProviderEventKind::RefundProcessed { payment_id } => {
                let transition = self
                    .store
                    .refund_payment(&RefundCommand {
                        provider_payment_id: payment_id.clone(),
                        at: now,
                    })
                    .await?;
                self.after_cancel(payment_id, "payment refunded", transition).await?;
            }
            ProviderEventKind::Unrecognized => {
                tracing::info!("Unhandled event type, ignoring");
                return Ok(WebhookOutcome::Ignored);
            }
        }

        Ok(WebhookOutcome::Processed)
    }

    async fn after_capture(
        &self,
        order_id: &str,
        payment_id: &str,
        transition: Transition,
    ) -> Result<(), StoreError> {
        match transition {
            Transition::Applied {
                payment,
                reservation,
                tickets_issued,
                ..
            } => {
                metrics::record_payment(payment.status.as_str());
                tracing::info!(
                    payment_id = %payment.id,
                    reservation_id = %reservation.id,
                    kind = %reservation.kind,
                    tickets_issued,
                    "Payment captured, reservation confirmed"
                );
                self.record_audit("payment.captured", &payment, &reservation, json!({
                    "provider_payment_id": payment_id,
                    "tickets_issued": tickets_issued,
                }))
                .await;
                sinks::notify(
                    self.notifier.as_ref(),
                    Notification::ReservationConfirmed {
                        reservation_id: reservation.id,
                        kind: reservation.kind,
                        user_id: reservation.user_id,
                        vendor_id: reservation.vendor_id,
                    },
                )
                .await;
            }
            Transition::Unchanged { payment } => match payment.status {
                PaymentStatus::Failed | PaymentStatus::Refunded => {
                    // Money arrived for a reservation that is already cancelled.
                    tracing::warn!(
                        payment_id = %payment.id,
                        status = %payment.status,
                        provider_payment_id = payment_id,
                        "Capture after cancellation, manual refund required"
                    );
                    sinks::audit(
                        self.audit.as_ref(),
                        AuditEntry {
                            action: "payment.capture_after_cancellation".to_string(),
                            subject: payment.id.to_string(),
                            detail: json!({
                                "order_id": order_id,
                                "provider_payment_id": payment_id,
                                "status": payment.status,
                                "amount_minor": payment.amount.minor,
                                "currency": payment.amount.currency,
                                "reservation_id": payment.reservation.id,
                                "needs_manual_refund": true,
                            }),
                            at: self.clock.now(),
                        },
                    )
                    .await;
                    self.inventory.release(payment.reservation.id).await?;
                }
                _ => tracing::debug!(
                    payment_id = %payment.id,
                    status = %payment.status,
                    "Capture already applied"
                ),
            },
            Transition::UnknownPayment => {
                tracing::warn!(order_id, "Capture for unknown order, nothing to reconcile");
            }
        }
        Ok(())
    }

    async fn after_cancel(
        &self,
        reference: &str,
        reason: &str,
        transition: Transition,
    ) -> Result<(), StoreError> {
        match transition {
            Transition::Applied {
                payment,
                reservation,
                tickets_voided,
                ..
            } => {
                metrics::record_payment(payment.status.as_str());
                tracing::info!(
                    payment_id = %payment.id,
                    reservation_id = %reservation.id,
                    status = %payment.status,
                    reason,
                    tickets_voided,
                    "Reservation cancelled"
                );
                let action = format!("payment.{}", payment.status);
                self.record_audit(&action, &payment, &reservation, json!({
                    "reason": reason,
                    "tickets_voided": tickets_voided,
                }))
                .await;
                sinks::notify(
                    self.notifier.as_ref(),
                    Notification::ReservationCancelled {
                        reservation_id: reservation.id,
                        kind: reservation.kind,
                        user_id: reservation.user_id,
                        reason: reason.to_string(),
                    },
                )
                .await;
                self.inventory.release(reservation.id).await?;
            }
            Transition::Unchanged { payment } => {
                if matches!(payment.status, PaymentStatus::Failed | PaymentStatus::Refunded) {
                    // A previous attempt may have stopped before the release.
                    self.inventory.release(payment.reservation.id).await?;
                } else {
                    tracing::info!(
                        payment_id = %payment.id,
                        status = %payment.status,
                        "Cancellation does not apply, ignoring"
                    );
                }
            }
            Transition::UnknownPayment => {
                tracing::warn!(reference, "Cancellation for unknown payment, nothing to reconcile");
            }
        }
        Ok(())
    }

    async fn record_audit(
        &self,
        action: &str,
        payment: &Payment,
        reservation: &Reservation,
        extra: serde_json::Value,
    ) {
        sinks::audit(
            self.audit.as_ref(),
            AuditEntry {
                action: action.to_string(),
                subject: payment.id.to_string(),
                detail: json!({
                    "order_id": payment.provider_order_id,
                    "reservation_id": reservation.id,
                    "reservation_kind": reservation.kind,
                    "reservation_status": reservation.status,
                    "amount_minor": payment.amount.minor,
                    "extra": extra,
                }),
                at: payment.updated_at,
            },
        )
        .await;
    }
}
