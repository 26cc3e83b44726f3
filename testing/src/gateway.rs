//! Scripted payment gateway.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use marketplace_core::GatewayError;
use marketplace_core::ports::{GatewayOrder, OrderRequest, PaymentGateway};
use marketplace_core::types::PaymentProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Payment gateway double.
///
/// Orders are numbered `order_mock_1`, `order_mock_2`, ... Every request is
/// kept for inspection, including the ones that were made to fail.
///
/// # Example
///
/// ```
/// use marketplace_testing::MockPaymentGateway;
/// use marketplace_core::GatewayError;
///
/// let gateway = MockPaymentGateway::new();
/// gateway.fail_with(GatewayError::Unavailable("timeout".into()));
/// assert_eq!(gateway.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    key: String,
    next_order: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<GatewayError>>>,
    requests: Arc<Mutex<Vec<OrderRequest>>>,
}

impl MockPaymentGateway {
    /// A gateway that accepts every order
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: "rzp_test_mock".to_string(),
            next_order: Arc::new(AtomicU64::new(1)),
            failure: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every following order with `error` until [`Self::recover`].
    pub fn fail_with(&self, error: GatewayError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Accept orders again.
    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of `create_order` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    fn checkout_key(&self) -> &str {
        &self.key
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            order_id: format!("order_mock_{n}"),
            amount_minor: request.amount.minor,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::types::{Currency, Money};
    use std::collections::BTreeMap;

    fn request(minor: i64) -> OrderRequest {
        OrderRequest {
            amount: Money::from_minor(minor, Currency::inr()),
            receipt: "r-1".to_string(),
            notes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_orders_are_numbered() {
        let gateway = MockPaymentGateway::new();
        let first = gateway.create_order(&request(5_000)).await.unwrap();
        let second = gateway.create_order(&request(9_900)).await.unwrap();

        assert_eq!(first.order_id, "order_mock_1");
        assert_eq!(second.order_id, "order_mock_2");
        assert_eq!(second.amount_minor, 9_900);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let gateway = MockPaymentGateway::new();
        gateway.fail_with(GatewayError::Rejected {
            status: 400,
            message: "bad amount".into(),
        });
        assert!(gateway.create_order(&request(1)).await.is_err());

        gateway.recover();
        assert!(gateway.create_order(&request(1)).await.is_ok());
        assert_eq!(gateway.call_count(), 2);
    }
}
