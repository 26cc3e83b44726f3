//! Reservation status endpoint, polled by clients after checkout.

use crate::orchestrator::ReservationView;
use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use chrono::{DateTime, NaiveDate, Utc};
use marketplace_core::types::{PaymentStatus, ReservationId, ReservationKind, ReservationStatus};
use marketplace_web::{AppError, Session};
use serde::Serialize;
use uuid::Uuid;

/// Amount in minor units with its currency.
#[derive(Debug, Serialize)]
pub struct AmountDto {
    /// Minor units
    pub amount: i64,
    /// ISO code
    pub currency: String,
}

/// One purchased line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDto {
    /// Catalog resource
    pub resource_id: Uuid,
    /// Units
    pub quantity: u32,
    /// Price per unit
    pub unit_price: AmountDto,
}

/// Payment summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    /// Local payment id
    pub id: Uuid,
    /// Payment status
    pub status: PaymentStatus,
    /// Gateway order reference
    pub order_id: String,
    /// Gateway payment reference, once captured
    pub provider_payment_id: Option<String>,
}

/// An issued ticket.
#[derive(Debug, Serialize)]
pub struct TicketDto {
    /// Ticket id
    pub id: Uuid,
    /// Scannable code
    pub code: String,
}

/// Response of `GET /api/reservations/:id`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    /// Reservation id
    pub id: Uuid,
    /// Vertical
    pub kind: ReservationKind,
    /// Reservation status
    pub status: ReservationStatus,
    /// Service date for bookings
    pub service_date: Option<NaiveDate>,
    /// Total charged
    pub total: AmountDto,
    /// Purchased lines
    pub line_items: Vec<LineItemDto>,
    /// Linked payment
    pub payment: PaymentDto,
    /// Issued tickets
    pub tickets: Vec<TicketDto>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl From<ReservationView> for ReservationResponse {
    fn from(view: ReservationView) -> Self {
        let ReservationView {
            reservation,
            payment,
            tickets,
        } = view;

        Self {
            id: *reservation.id.as_uuid(),
            kind: reservation.kind,
            status: reservation.status,
            service_date: reservation.service_date,
            total: AmountDto {
                amount: reservation.total.minor,
                currency: reservation.total.currency.to_string(),
            },
            line_items: reservation
                .line_items
                .into_iter()
                .map(|item| LineItemDto {
                    resource_id: *item.resource_id.as_uuid(),
                    quantity: item.quantity,
                    unit_price: AmountDto {
                        amount: item.unit_price.minor,
                        currency: item.unit_price.currency.to_string(),
                    },
                })
                .collect(),
            payment: PaymentDto {
                id: *payment.id.as_uuid(),
                status: payment.status,
                order_id: payment.provider_order_id,
                provider_payment_id: payment.provider_payment_id,
            },
            tickets: tickets
                .into_iter()
                .map(|ticket| TicketDto {
                    id: *ticket.id.as_uuid(),
                    code: ticket.code,
                })
                .collect(),
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}

/// Get one of the caller's reservations.
///
/// # Errors
///
/// 400 malformed id, 401 unauthenticated, 404 unknown or foreign reservation.
pub async fn get_reservation(
    State(state): State<AppState>,
    Session(ctx): Session,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ReservationResponse>, AppError> {
    let Path(id) = id.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    let view = state
        .orchestrator
        .reservation_status(&ctx, ReservationId::from_uuid(id))
        .await?;

    Ok(Json(view.into()))
}
