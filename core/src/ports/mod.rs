//! Ports: storage and collaborator traits.
//!
//! Every trait is object safe (`Arc<dyn ...>`) so the application can swap the
//! `PostgreSQL` adapters for the in-memory ones from `marketplace-testing`.

pub mod catalog;
pub mod checkout;
pub mod gateway;
pub mod inventory;
pub mod sinks;
pub mod webhooks;

pub use catalog::{CatalogItem, CatalogLookup, Pricing};
pub use checkout::{
    CaptureCommand, CheckoutStore, FailureCommand, RefundCommand, Transition,
};
pub use gateway::{
    GatewayOrder, OrderRequest, PaymentGateway, ProviderEvent, ProviderEventKind, WebhookVerifier,
};
pub use inventory::{InventoryLedger, ReleaseOutcome, ReserveOutcome};
pub use sinks::{AuditEntry, AuditLog, Notification, NotificationDispatcher, SinkError};
pub use webhooks::{RecordOutcome, WebhookEventStore};
