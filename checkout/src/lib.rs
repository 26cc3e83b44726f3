//! Marketplace checkout service.
//!
//! Payment and inventory reconciliation for a multi-vertical marketplace:
//! restaurant table bookings, nightclub ticket orders and party-hall lead
//! unlocks all share one purchase flow.
//!
//! ```text
//!  POST /api/purchases                       POST /webhooks/razorpay
//!          │                                          │
//!          ▼                                          ▼
//! ┌─────────────────────┐                 ┌─────────────────────┐
//! │    Reservation      │                 │      Webhook        │
//! │    Orchestrator     │                 │     Reconciler      │
//! └─────────────────────┘                 └─────────────────────┘
//!    │        │       │                      │        │       │
//!    ▼        ▼       ▼                      ▼        ▼       ▼
//! Inventory Payment  Checkout ◄──────────── Checkout Event   Sinks
//!  Ledger   Intents   Store                  Store   Ledger (notify/audit)
//! ```
//!
//! Capacity is held atomically before any gateway order exists. A reservation
//! becomes `confirmed` only when its payment is `captured`, and a payment
//! failure or refund returns the held units exactly once, however often the
//! provider redelivers the callback.
//!
//! The services depend only on the ports in `marketplace_core::ports`; the
//! server binary wires them to `PostgreSQL` and Razorpay.

#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod intent;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod reconciler;
pub mod server;
pub mod sinks;

pub use config::Config;
pub use intent::{CheckoutMode, PaymentIntent, PaymentIntentManager, PurchaseContext};
pub use ledger::InventoryService;
pub use orchestrator::{
    CheckoutReceipt, PurchaseLine, PurchaseRequest, PurchaseRules, ReservationOrchestrator,
    ReservationView,
};
pub use reconciler::{ReplayReport, WebhookOutcome, WebhookReconciler};
pub use server::{AppState, Dependencies, build_router};
pub use sinks::TracingNotifier;
