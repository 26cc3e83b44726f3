//! Payment provider callbacks.
//!
//! No session here: the request is authenticated by its signature, which is
//! computed over the raw body. The body is therefore taken as bytes and only
//! parsed after verification.

use crate::reconciler::WebhookOutcome;
use crate::server::AppState;
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use marketplace_razorpay::{EVENT_ID_HEADER, SIGNATURE_HEADER};
use marketplace_web::{AppError, CorrelationId};
use serde::Serialize;

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// `processed`, `duplicate` or `ignored`
    pub status: WebhookOutcome,
}

/// Receive a Razorpay webhook.
///
/// Duplicates and unrecognized events are acknowledged with 200 so the
/// provider stops retrying them.
///
/// # Errors
///
/// 400 for a bad signature or malformed body, 500 if reconciliation failed
/// (the provider retries).
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = header(&headers, SIGNATURE_HEADER);
    let event_id = header(&headers, EVENT_ID_HEADER);

    tracing::debug!(
        correlation_id = %correlation_id.0,
        event_id = event_id.unwrap_or("-"),
        bytes = body.len(),
        "Webhook received"
    );

    let status = state.reconciler.handle(&body, signature, event_id).await?;

    Ok(Json(WebhookAck { status }))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
