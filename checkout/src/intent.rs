//! Payment Intent Manager.
//!
//! Creates the external order for a purchase and builds the local [`Payment`]
//! describing it. Nothing is persisted here: the orchestrator writes the
//! payment together with its reservation once this call succeeded, so a
//! gateway failure can never leave a pending payment behind.
//!
//! Without a configured gateway the manager runs in manual mode: it makes up
//! a local order id and returns the payment already captured.

use crate::metrics;
use marketplace_core::GatewayError;
use marketplace_core::environment::Clock;
use marketplace_core::ports::{OrderRequest, PaymentGateway};
use marketplace_core::types::{
    Money, Payment, PaymentId, PaymentProvider, PaymentStatus, ReservationRef, ResourceId, UserId,
    VendorId,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// How the purchaser completes payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// Client-side checkout against the live gateway; a webhook confirms it.
    Gateway,
    /// No gateway configured; the purchase is confirmed immediately.
    Manual,
}

impl CheckoutMode {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Manual => "manual",
        }
    }
}

/// Who is paying whom, for what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseContext {
    /// Purchaser
    pub user_id: UserId,
    /// Vendor being paid
    pub vendor_id: VendorId,
    /// Restaurant, event or lead
    pub parent_id: ResourceId,
    /// Reservation the payment will pay for
    pub reservation: ReservationRef,
}

/// A created (not yet persisted) payment and what the client needs to pay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Payment to persist alongside the reservation
    pub payment: Payment,
    /// Public gateway key for the checkout widget
    pub checkout_key: Option<String>,
    /// Gateway or manual settlement
    pub mode: CheckoutMode,
}

/// Creates payment intents against the configured gateway.
#[derive(Clone)]
pub struct PaymentIntentManager {
    gateway: Option<Arc<dyn PaymentGateway>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PaymentIntentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentIntentManager")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl PaymentIntentManager {
    /// Manager using `gateway`, or manual settlement when `None`.
    #[must_use]
    pub fn new(gateway: Option<Arc<dyn PaymentGateway>>, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }

    /// Mode new intents are created in.
    #[must_use]
    pub fn mode(&self) -> CheckoutMode {
        if self.gateway.is_some() {
            CheckoutMode::Gateway
        } else {
            CheckoutMode::Manual
        }
    }

    /// Create an intent for `amount`.
    ///
    /// The amount must come from catalog pricing, never from the client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway could not create the order.
    #[tracing::instrument(
        skip(self, amount),
        fields(reservation_id = %purchase.reservation.id, amount = amount.minor)
    )]
    pub async fn create_intent(
        &self,
        amount: &Money,
        purchase: &PurchaseContext,
    ) -> Result<PaymentIntent, GatewayError> {
        let now = self.clock.now();

        let Some(gateway) = &self.gateway else {
            let payment = Payment {
                id: PaymentId::new(),
                amount: amount.clone(),
                provider: PaymentProvider::Manual,
                provider_order_id: format!("manual_{}", Uuid::new_v4()),
                provider_payment_id: None,
                status: PaymentStatus::Captured,
                user_id: purchase.user_id,
                reservation: purchase.reservation,
                created_at: now,
                updated_at: now,
            };
            tracing::info!(order_id = %payment.provider_order_id, "Manual payment settled");
            return Ok(PaymentIntent {
                payment,
                checkout_key: None,
                mode: CheckoutMode::Manual,
            });
        };

        let request = OrderRequest {
            amount: amount.clone(),
            receipt: purchase.reservation.id.to_string(),
            notes: notes(purchase),
        };

        let started = Instant::now();
        let result = gateway.create_order(&request).await;
        metrics::record_gateway_latency(started.elapsed());
        let order = result.inspect_err(|e| {
            tracing::warn!(error = %e, "Gateway order creation failed");
        })?;

        tracing::info!(order_id = %order.order_id, "Gateway order created");

        Ok(PaymentIntent {
            payment: Payment {
                id: PaymentId::new(),
                amount: amount.clone(),
                provider: gateway.provider(),
                provider_order_id: order.order_id,
                provider_payment_id: None,
                status: PaymentStatus::Pending,
                user_id: purchase.user_id,
                reservation: purchase.reservation,
                created_at: now,
                updated_at: now,
            },
            checkout_key: Some(gateway.checkout_key().to_string()),
            mode: CheckoutMode::Gateway,
        })
    }
}

fn notes(purchase: &PurchaseContext) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("reservation_kind".to_string(), purchase.reservation.kind.to_string()),
        ("reservation_id".to_string(), purchase.reservation.id.to_string()),
        ("user_id".to_string(), purchase.user_id.to_string()),
        ("vendor_id".to_string(), purchase.vendor_id.to_string()),
        ("parent_id".to_string(), purchase.parent_id.to_string()),
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::types::{Currency, ReservationId, ReservationKind};
    use marketplace_testing::{MockPaymentGateway, test_clock};

    fn purchase() -> PurchaseContext {
        PurchaseContext {
            user_id: UserId::new(),
            vendor_id: VendorId::new(),
            parent_id: ResourceId::new(),
            reservation: ReservationRef {
                kind: ReservationKind::TicketOrder,
                id: ReservationId::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_gateway_intent_is_pending() {
        let gateway = MockPaymentGateway::new();
        let manager =
            PaymentIntentManager::new(Some(Arc::new(gateway.clone())), Arc::new(test_clock()));
        let purchase = purchase();

        let intent = manager
            .create_intent(&Money::from_minor(3_000, Currency::inr()), &purchase)
            .await
            .unwrap();

        assert_eq!(intent.mode, CheckoutMode::Gateway);
        assert_eq!(intent.payment.status, PaymentStatus::Pending);
        assert_eq!(intent.payment.provider_order_id, "order_mock_1");
        assert_eq!(intent.payment.reservation, purchase.reservation);
        assert_eq!(intent.checkout_key.as_deref(), Some("rzp_test_mock"));

        let request = &gateway.requests()[0];
        assert_eq!(request.amount.minor, 3_000);
        assert_eq!(request.receipt, purchase.reservation.id.to_string());
        assert_eq!(request.notes["reservation_kind"], "ticket_order");
    }

    #[tokio::test]
    async fn test_manual_intent_is_captured() {
        let manager = PaymentIntentManager::new(None, Arc::new(test_clock()));

        let intent = manager
            .create_intent(&Money::from_minor(500, Currency::inr()), &purchase())
            .await
            .unwrap();

        assert_eq!(manager.mode(), CheckoutMode::Manual);
        assert_eq!(intent.payment.status, PaymentStatus::Captured);
        assert_eq!(intent.payment.provider, PaymentProvider::Manual);
        assert!(intent.payment.provider_order_id.starts_with("manual_"));
        assert!(intent.checkout_key.is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_with(GatewayError::Unavailable("connection reset".into()));
        let manager = PaymentIntentManager::new(Some(Arc::new(gateway)), Arc::new(test_clock()));

        let err = manager
            .create_intent(&Money::from_minor(500, Currency::inr()), &purchase())
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::Unavailable("connection reset".into()));
    }
}
