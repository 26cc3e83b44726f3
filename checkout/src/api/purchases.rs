//! Purchase endpoint.
//!
//! The client names what it wants; the amount is always computed from the
//! catalog.

use crate::orchestrator::{CheckoutReceipt, PurchaseLine, PurchaseRequest};
use crate::server::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::NaiveDate;
use marketplace_core::types::ResourceId;
use marketplace_web::{AppError, CorrelationId, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /api/purchases`.
///
/// Either `resourceId` + `quantity`, or `items` for several ticket tiers of
/// one event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBody {
    /// Single resource to buy
    pub resource_id: Option<Uuid>,
    /// Units of `resource_id`
    pub quantity: Option<u32>,
    /// Several lines at once
    #[serde(default)]
    pub items: Vec<PurchaseItem>,
    /// Service date for bookings
    pub date: Option<NaiveDate>,
}

/// One entry of `items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    /// Resource to buy
    pub resource_id: Uuid,
    /// Units
    pub quantity: u32,
}

impl TryFrom<PurchaseBody> for PurchaseRequest {
    type Error = AppError;

    fn try_from(body: PurchaseBody) -> Result<Self, Self::Error> {
        let lines = match (body.resource_id, body.items.is_empty()) {
            (Some(resource_id), true) => vec![PurchaseLine {
                resource_id: ResourceId::from_uuid(resource_id),
                quantity: body
                    .quantity
                    .ok_or_else(|| AppError::bad_request("quantity is required"))?,
            }],
            (None, false) => body
                .items
                .into_iter()
                .map(|item| PurchaseLine {
                    resource_id: ResourceId::from_uuid(item.resource_id),
                    quantity: item.quantity,
                })
                .collect(),
            (Some(_), false) => {
                return Err(AppError::bad_request(
                    "send either resourceId or items, not both",
                ));
            }
            (None, true) => return Err(AppError::bad_request("resourceId is required")),
        };

        Ok(Self {
            lines,
            date: body.date,
        })
    }
}

/// Response body of a successful purchase.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Gateway (or manual) order id
    pub order_id: String,
    /// Amount in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Public gateway key, `null` in manual mode
    pub checkout_key: Option<String>,
    /// Local reservation id
    pub internal_reservation_id: Uuid,
    /// `booking`, `ticket_order` or `lead_unlock`
    pub reservation_kind: String,
    /// Reservation status (`pending`, or `confirmed` in manual mode)
    pub status: String,
    /// `gateway` or `manual`
    pub checkout_mode: &'static str,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            order_id: receipt.provider_order_id,
            amount: receipt.amount.minor,
            currency: receipt.amount.currency.to_string(),
            checkout_key: receipt.checkout_key,
            internal_reservation_id: *receipt.reservation_id.as_uuid(),
            reservation_kind: receipt.reservation_kind.to_string(),
            status: receipt.status.to_string(),
            checkout_mode: receipt.mode.as_str(),
        }
    }
}

/// Start a purchase.
///
/// # Errors
///
/// 400 invalid input, 401 unauthenticated, 404 unknown resource,
/// 409 `CAPACITY_EXCEEDED`, 500 `PAYMENT_GATEWAY_ERROR` or internal error.
pub async fn create_purchase(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Session(ctx): Session,
    body: Result<Json<PurchaseBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let Json(body) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let request = PurchaseRequest::try_from(body)?;

    tracing::debug!(
        correlation_id = %correlation_id.0,
        lines = request.lines.len(),
        "Purchase requested"
    );

    let receipt = state.orchestrator.purchase(&ctx, request).await?;

    Ok((StatusCode::CREATED, Json(receipt.into())))
}
