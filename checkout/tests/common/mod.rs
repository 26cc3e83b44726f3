//! Shared setup for checkout integration tests.
//!
//! Wires the real services to the in-memory doubles from
//! `marketplace-testing` and the real Razorpay webhook verifier.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::unwrap_used)]

use marketplace_checkout::config::CheckoutConfig;
use marketplace_checkout::{
    AppState, Dependencies, ReservationOrchestrator, WebhookOutcome, WebhookReconciler,
};
use marketplace_core::ports::{CatalogItem, PaymentGateway};
use marketplace_core::types::{Currency, ResourceId, UserId};
use marketplace_core::{RequestContext, WebhookError};
use marketplace_razorpay::{RazorpayWebhooks, signature_for};
use marketplace_testing::{
    InMemoryStore, MockPaymentGateway, RecordingAuditLog, RecordingNotifier, fixtures, test_clock,
};
use serde_json::json;
use std::sync::Arc;

/// Webhook secret the harness verifier is configured with
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Services plus handles on every double.
#[derive(Clone)]
pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: MockPaymentGateway,
    pub notifier: RecordingNotifier,
    pub audit: RecordingAuditLog,
    pub state: AppState,
}

impl Harness {
    /// Gateway mode: purchases stay pending until a webhook arrives.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Manual mode: no gateway, purchases confirm immediately.
    pub fn manual() -> Self {
        Self::build(false)
    }

    fn build(with_gateway: bool) -> Self {
        let store = InMemoryStore::new();
        let gateway = MockPaymentGateway::new();
        let notifier = RecordingNotifier::new();
        let audit = RecordingAuditLog::new();

        let live_gateway: Option<Arc<dyn PaymentGateway>> =
            with_gateway.then(|| Arc::new(gateway.clone()) as Arc<dyn PaymentGateway>);

        let state = AppState::new(
            Dependencies {
                catalog: Arc::new(store.clone()),
                ledger: Arc::new(store.clone()),
                store: Arc::new(store.clone()),
                events: Arc::new(store.clone()),
                gateway: live_gateway,
                verifier: Arc::new(RazorpayWebhooks::new(Some(WEBHOOK_SECRET.to_string()))),
                notifier: Arc::new(notifier.clone()),
                audit: Arc::new(audit.clone()),
                clock: Arc::new(test_clock()),
            },
            &CheckoutConfig::default(),
        );

        Self {
            store,
            gateway,
            notifier,
            audit,
            state,
        }
    }

    pub fn orchestrator(&self) -> &ReservationOrchestrator {
        &self.state.orchestrator
    }

    pub fn reconciler(&self) -> &WebhookReconciler {
        &self.state.reconciler
    }

    /// Publish a ticket tier of a fresh event.
    pub fn ticket_tier(&self, capacity: u32, price_minor: i64) -> CatalogItem {
        let tier =
            fixtures::ticket_tier(ResourceId::new(), capacity, price_minor, &Currency::inr());
        self.store.add_catalog_item(tier.clone());
        tier
    }

    /// Publish an arbitrary catalog item.
    pub fn publish(&self, item: CatalogItem) -> CatalogItem {
        self.store.add_catalog_item(item.clone());
        item
    }

    /// Deliver a correctly signed webhook.
    pub async fn deliver(
        &self,
        event_id: &str,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = signature_for(WEBHOOK_SECRET, body);
        self.reconciler()
            .handle(body, Some(&signature), Some(event_id))
            .await
    }
}

/// A fresh authenticated purchaser.
pub fn buyer() -> RequestContext {
    RequestContext::authenticated(UserId::new())
}

pub fn payment_captured(order_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": {
            "payment": {"entity": {"id": payment_id, "order_id": order_id, "status": "captured"}}
        }
    }))
    .unwrap()
}

pub fn order_paid(order_id: &str, payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": "order.paid",
        "payload": {
            "order": {"entity": {"id": order_id, "status": "paid"}},
            "payment": {"entity": {"id": payment_id, "order_id": order_id, "status": "captured"}}
        }
    }))
    .unwrap()
}

pub fn payment_failed(order_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": "payment.failed",
        "payload": {
            "payment": {"entity": {
                "id": "pay_failed",
                "order_id": order_id,
                "status": "failed",
                "error_description": "Card declined"
            }}
        }
    }))
    .unwrap()
}

pub fn refund_processed(payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": "refund.processed",
        "payload": {
            "refund": {"entity": {"id": "rfnd_1", "payment_id": payment_id}}
        }
    }))
    .unwrap()
}

pub fn unrecognized() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "entity": "event",
        "event": "subscription.charged",
        "payload": {}
    }))
    .unwrap()
}
