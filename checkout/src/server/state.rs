//! Application state for the checkout HTTP server.

use crate::config::CheckoutConfig;
use crate::intent::PaymentIntentManager;
use crate::ledger::InventoryService;
use crate::orchestrator::{PurchaseRules, ReservationOrchestrator};
use crate::reconciler::WebhookReconciler;
use axum::extract::FromRef;
use marketplace_core::environment::Clock;
use marketplace_core::ports::{
    AuditLog, CatalogLookup, CheckoutStore, InventoryLedger, NotificationDispatcher,
    PaymentGateway, WebhookEventStore, WebhookVerifier,
};
use marketplace_web::SessionHeader;
use std::sync::Arc;

/// Every collaborator the service needs, as trait objects.
///
/// The server binary fills these from `PostgreSQL` and Razorpay; tests use
/// the in-memory doubles from `marketplace-testing`.
#[derive(Clone)]
pub struct Dependencies {
    /// Vendor catalog
    pub catalog: Arc<dyn CatalogLookup>,
    /// Capacity counters
    pub ledger: Arc<dyn InventoryLedger>,
    /// Payments, reservations and tickets
    pub store: Arc<dyn CheckoutStore>,
    /// Webhook idempotency ledger
    pub events: Arc<dyn WebhookEventStore>,
    /// Live gateway, `None` for manual settlement
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    /// Webhook authentication and decoding
    pub verifier: Arc<dyn WebhookVerifier>,
    /// Notification delivery
    pub notifier: Arc<dyn NotificationDispatcher>,
    /// Audit trail
    pub audit: Arc<dyn AuditLog>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all HTTP handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Purchase flow
    pub orchestrator: Arc<ReservationOrchestrator>,
    /// Webhook handling
    pub reconciler: Arc<WebhookReconciler>,
    /// Storage, for readiness probes
    pub store: Arc<dyn CheckoutStore>,
    /// Header carrying the authenticated user id
    pub session_header: SessionHeader,
}

impl AppState {
    /// Build the services from their dependencies.
    #[must_use]
    pub fn new(deps: Dependencies, checkout: &CheckoutConfig) -> Self {
        let inventory = InventoryService::new(deps.ledger);

        let orchestrator = ReservationOrchestrator::new(
            deps.catalog,
            inventory.clone(),
            PaymentIntentManager::new(deps.gateway, Arc::clone(&deps.clock)),
            Arc::clone(&deps.store),
            Arc::clone(&deps.notifier),
            Arc::clone(&deps.audit),
            Arc::clone(&deps.clock),
            PurchaseRules {
                currency: checkout.currency.clone(),
                max_quantity: checkout.max_quantity,
            },
        );

        let reconciler = WebhookReconciler::new(
            deps.verifier,
            deps.events,
            Arc::clone(&deps.store),
            inventory,
            deps.notifier,
            deps.audit,
            deps.clock,
        );

        Self {
            orchestrator: Arc::new(orchestrator),
            reconciler: Arc::new(reconciler),
            store: deps.store,
            session_header: SessionHeader(checkout.auth_user_header.clone()),
        }
    }
}

impl FromRef<AppState> for SessionHeader {
    fn from_ref(state: &AppState) -> Self {
        state.session_header.clone()
    }
}

impl FromRef<AppState> for Arc<dyn CheckoutStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.store)
    }
}
