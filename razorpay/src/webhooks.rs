//! Webhook signature verification and event decoding
//!
//! Razorpay signs the raw request body with HMAC-SHA256 under the webhook
//! secret and sends the hex digest in `X-Razorpay-Signature`. The unique event
//! id arrives in `X-Razorpay-Event-Id` and, for older payloads, as the
//! top-level `id` field.

use crate::types::{OrderEntity, PaymentEntity, RefundEntity};
use hmac::{Hmac, Mac};
use marketplace_core::WebhookError;
use marketplace_core::ports::{ProviderEvent, ProviderEventKind, WebhookVerifier};
use marketplace_core::types::PaymentProvider;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Header carrying the unique event id
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// Hex HMAC-SHA256 of `body` under `secret`, as Razorpay computes it
#[must_use]
pub fn signature_for(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifier for Razorpay webhook deliveries
#[derive(Clone, Default)]
pub struct RazorpayWebhooks {
    secret: Option<String>,
}

impl std::fmt::Debug for RazorpayWebhooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayWebhooks")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl RazorpayWebhooks {
    /// Create a verifier. An empty secret counts as not configured, and an
    /// unconfigured verifier rejects every delivery.
    #[must_use]
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Whether a webhook secret is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}

fn entity<T: DeserializeOwned>(payload: &Value, name: &str) -> Result<T, WebhookError> {
    let value = payload
        .pointer(&format!("/payload/{name}/entity"))
        .ok_or_else(|| WebhookError::Malformed(format!("missing payload.{name}.entity")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| WebhookError::Malformed(format!("invalid payload.{name}.entity: {e}")))
}

fn kind_of(event_type: &str, payload: &Value) -> Result<ProviderEventKind, WebhookError> {
    Ok(match event_type {
        "payment.captured" => {
            let payment: PaymentEntity = entity(payload, "payment")?;
            let order_id = payment.order_id.ok_or_else(|| {
                WebhookError::Malformed(format!("payment {} has no order_id", payment.id))
            })?;
            ProviderEventKind::PaymentCaptured {
                order_id,
                payment_id: payment.id,
            }
        }
        "order.paid" => {
            let order: OrderEntity = entity(payload, "order")?;
            let payment: PaymentEntity = entity(payload, "payment")?;
            ProviderEventKind::PaymentCaptured {
                order_id: order.id,
                payment_id: payment.id,
            }
        }
        "payment.failed" => {
            let payment: PaymentEntity = entity(payload, "payment")?;
            let order_id = payment.order_id.ok_or_else(|| {
                WebhookError::Malformed(format!("payment {} has no order_id", payment.id))
            })?;
            ProviderEventKind::PaymentFailed {
                order_id,
                reason: payment.error_description,
            }
        }
        "refund.processed" => {
            let refund: RefundEntity = entity(payload, "refund")?;
            ProviderEventKind::RefundProcessed {
                payment_id: refund.payment_id,
            }
        }
        _ => ProviderEventKind::Unrecognized,
    })
}

impl WebhookVerifier for RazorpayWebhooks {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Razorpay
    }

    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<(), WebhookError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| WebhookError::SignatureInvalid("webhook secret not configured".into()))?;
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WebhookError::SignatureInvalid("missing signature".into()))?;
        let provided = hex::decode(signature)
            .map_err(|_| WebhookError::SignatureInvalid("signature is not hex".into()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| WebhookError::SignatureInvalid(e.to_string()))?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| WebhookError::SignatureInvalid("signature mismatch".into()))
    }

    fn decode(
        &self,
        body: &[u8],
        event_id_hint: Option<&str>,
    ) -> Result<ProviderEvent, WebhookError> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::Malformed(format!("body is not JSON: {e}")))?;

        let event_id = event_id_hint
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                payload
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
            })
            .ok_or_else(|| WebhookError::Malformed("missing event id".into()))?;

        let event_type = payload
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| WebhookError::Malformed("missing event type".into()))?
            .to_string();

        let kind = kind_of(&event_type, &payload)?;

        Ok(ProviderEvent {
            event_id,
            event_type,
            kind,
            payload,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn captured_body() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {"entity": {"id": "pay_1", "order_id": "order_1", "amount": 5000}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_verifies() {
        let webhooks = RazorpayWebhooks::new(Some(SECRET.into()));
        let body = captured_body();
        let signature = signature_for(SECRET, &body);

        assert!(webhooks.verify(&body, Some(&signature)).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let webhooks = RazorpayWebhooks::new(Some(SECRET.into()));
        let signature = signature_for(SECRET, &captured_body());

        let result = webhooks.verify(b"{\"event\":\"payment.captured\"}", Some(&signature));
        assert!(matches!(result, Err(WebhookError::SignatureInvalid(_))));
    }

    #[test]
    fn test_missing_signature_or_secret_is_rejected() {
        let body = captured_body();
        let configured = RazorpayWebhooks::new(Some(SECRET.into()));
        assert!(matches!(configured.verify(&body, None), Err(WebhookError::SignatureInvalid(_))));
        assert!(matches!(
            configured.verify(&body, Some("zz-not-hex")),
            Err(WebhookError::SignatureInvalid(_))
        ));

        let unconfigured = RazorpayWebhooks::new(Some(String::new()));
        assert!(!unconfigured.is_configured());
        let signature = signature_for("", &body);
        assert!(matches!(
            unconfigured.verify(&body, Some(&signature)),
            Err(WebhookError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_event_id_prefers_header() {
        let webhooks = RazorpayWebhooks::new(Some(SECRET.into()));
        let mut body: Value = serde_json::from_slice(&captured_body()).unwrap();
        body["id"] = json!("evt_body");
        let bytes = serde_json::to_vec(&body).unwrap();

        assert_eq!(webhooks.decode(&bytes, Some("evt_header")).unwrap().event_id, "evt_header");
        assert_eq!(webhooks.decode(&bytes, None).unwrap().event_id, "evt_body");
        assert!(matches!(
            webhooks.decode(&captured_body(), None),
            Err(WebhookError::Malformed(_))
        ));
    }

    #[test]
    fn test_event_mapping() {
        let webhooks = RazorpayWebhooks::default();
        let decode = |body: Value| {
            webhooks
                .decode(&serde_json::to_vec(&body).unwrap(), Some("evt"))
                .map(|e| e.kind)
        };

        assert_eq!(
            decode(captured_body_value()).unwrap(),
            ProviderEventKind::PaymentCaptured {
                order_id: "order_1".into(),
                payment_id: "pay_1".into()
            }
        );
        assert_eq!(
            decode(json!({
                "event": "order.paid",
                "payload": {
                    "order": {"entity": {"id": "order_2"}},
                    "payment": {"entity": {"id": "pay_2", "order_id": "order_2"}}
                }
            }))
            .unwrap(),
            ProviderEventKind::PaymentCaptured {
                order_id: "order_2".into(),
                payment_id: "pay_2".into()
            }
        );
        assert_eq!(
            decode(json!({
                "event": "payment.failed",
                "payload": {"payment": {"entity": {
                    "id": "pay_3", "order_id": "order_3", "error_description": "card declined"
                }}}
            }))
            .unwrap(),
            ProviderEventKind::PaymentFailed {
                order_id: "order_3".into(),
                reason: Some("card declined".into())
            }
        );
        assert_eq!(
            decode(json!({
                "event": "refund.processed",
                "payload": {"refund": {"entity": {"id": "rfnd_1", "payment_id": "pay_1"}}}
            }))
            .unwrap(),
            ProviderEventKind::RefundProcessed {
                payment_id: "pay_1".into()
            }
        );
        assert_eq!(
            decode(json!({"event": "settlement.processed", "payload": {}})).unwrap(),
            ProviderEventKind::Unrecognized
        );
        assert!(matches!(
            decode(json!({"event": "payment.captured", "payload": {}})),
            Err(WebhookError::Malformed(_))
        ));
    }

    fn captured_body_value() -> Value {
        serde_json::from_slice(&captured_body()).unwrap()
    }
}
