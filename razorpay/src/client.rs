//! Razorpay Orders API client

use crate::error::RazorpayError;
use crate::types::{CreateOrder, ErrorEnvelope, Order};
use async_trait::async_trait;
use marketplace_core::GatewayError;
use marketplace_core::ports::{GatewayOrder, OrderRequest, PaymentGateway};
use marketplace_core::types::PaymentProvider;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Default Razorpay API base URL
pub const DEFAULT_API_URL: &str = "https://api.razorpay.com/v1";

/// Razorpay API client
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    api_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a client from `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET` and
    /// optionally `RAZORPAY_API_URL`
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::MissingCredentials` if either key is unset or empty
    pub fn from_env() -> Result<Self, RazorpayError> {
        let key_id = std::env::var("RAZORPAY_KEY_ID").unwrap_or_default();
        let key_secret = std::env::var("RAZORPAY_KEY_SECRET").unwrap_or_default();
        if key_id.is_empty() || key_secret.is_empty() {
            return Err(RazorpayError::MissingCredentials);
        }

        let client = Self::new(key_id, key_secret);
        Ok(match std::env::var("RAZORPAY_API_URL") {
            Ok(url) if !url.is_empty() => client.with_api_url(url),
            _ => client,
        })
    }

    /// Create a client with explicit credentials
    #[must_use]
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point the client at another base URL (sandbox, test server)
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create an order
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` for network failures, timeouts and
    /// 5xx answers, `GatewayError::Rejected` for 4xx answers and
    /// `GatewayError::InvalidResponse` if the body cannot be parsed
    pub async fn create(&self, order: &CreateOrder) -> Result<Order, GatewayError> {
        let response = self
            .client
            .post(format!("{}/orders", self.api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .timeout(self.timeout)
            .json(order)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => response
                .json::<Order>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string())),
            status if status.is_server_error() => {
                Err(GatewayError::Unavailable(format!("Razorpay answered {status}")))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|envelope| {
                        format!("{}: {}", envelope.error.code, envelope.error.description)
                    })
                    .unwrap_or(body);
                Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    fn checkout_key(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let order = self
            .create(&CreateOrder {
                amount: request.amount.minor,
                currency: request.amount.currency.as_str().to_string(),
                receipt: request.receipt.clone(),
                notes: request.notes.clone(),
            })
            .await?;

        if order.amount != request.amount.minor {
            return Err(GatewayError::InvalidResponse(format!(
                "order {} amount {} does not match requested {}",
                order.id, order.amount, request.amount.minor
            )));
        }

        tracing::debug!(order_id = %order.id, amount = order.amount, "Razorpay order created");

        Ok(GatewayOrder {
            order_id: order.id,
            amount_minor: order.amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = RazorpayClient::new("rzp_test_key", "secret");
        assert_eq!(client.checkout_key(), "rzp_test_key");
        assert_eq!(client.api_url, DEFAULT_API_URL);

        let client = client.with_api_url("http://localhost:9000/v1/");
        assert_eq!(client.api_url, "http://localhost:9000/v1");
    }

    #[test]
    fn test_debug_hides_secret() {
        let client = RazorpayClient::new("rzp_test_key", "very-secret");
        assert!(!format!("{client:?}").contains("very-secret"));
    }
}
