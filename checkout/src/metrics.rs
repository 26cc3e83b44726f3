//! Business metrics for checkout and reconciliation.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `marketplace_purchases_total{outcome}` - Purchase attempts by outcome
//! - `marketplace_inventory_reservations_total{outcome}` - Ledger reservation attempts
//! - `marketplace_webhooks_total{outcome}` - Webhook deliveries by outcome
//! - `marketplace_payments_total{status}` - Payment status transitions
//!
//! ## Histograms
//! - `marketplace_gateway_order_duration_seconds` - Gateway order creation latency

use metrics::{describe_counter, describe_histogram};
use std::time::Duration;

/// Initialize and register all business metrics descriptions.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "marketplace_purchases_total",
        "Purchase attempts by outcome \
         (created, confirmed, capacity_exceeded, gateway_error, rejected, failed)"
    );
    describe_counter!(
        "marketplace_inventory_reservations_total",
        "Inventory ledger calls by outcome \
         (reserved, insufficient_capacity, unknown_unit, released, release_refused)"
    );
    describe_counter!(
        "marketplace_webhooks_total",
        "Webhook deliveries by outcome \
         (processed, duplicate, ignored, signature_invalid, malformed, failed)"
    );
    describe_counter!(
        "marketplace_payments_total",
        "Payment status transitions by resulting status"
    );
    describe_histogram!(
        "marketplace_gateway_order_duration_seconds",
        "Time taken to create an order at the payment gateway"
    );

    tracing::info!("Business metrics registered");
}

/// Record the outcome of a purchase attempt.
pub fn record_purchase(outcome: &'static str) {
    metrics::counter!("marketplace_purchases_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a ledger operation.
pub fn record_inventory(outcome: &'static str) {
    metrics::counter!("marketplace_inventory_reservations_total", "outcome" => outcome)
        .increment(1);
}

/// Record the outcome of a webhook delivery.
pub fn record_webhook(outcome: &'static str) {
    metrics::counter!("marketplace_webhooks_total", "outcome" => outcome).increment(1);
}

/// Record a payment reaching `status`.
pub fn record_payment(status: &'static str) {
    metrics::counter!("marketplace_payments_total", "status" => status).increment(1);
}

/// Record gateway order creation latency.
pub fn record_gateway_latency(elapsed: Duration) {
    metrics::histogram!("marketplace_gateway_order_duration_seconds").record(elapsed.as_secs_f64());
}
