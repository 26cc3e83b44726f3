//! Reservation Orchestrator.
//!
//! Runs a purchase end to end:
//!
//! 1. resolve and validate the requested resources against the catalog
//! 2. hold capacity in the inventory ledger
//! 3. create the payment intent (gateway order, or manual settlement)
//! 4. persist payment and reservation together
//!
//! Capacity is held before the gateway is called, so a sold-out resource never
//! produces an external order. Any failure after step 2 releases the hold
//! before the error is returned.

use crate::intent::{CheckoutMode, PaymentIntentManager, PurchaseContext};
use crate::ledger::InventoryService;
use crate::{metrics, sinks};
use chrono::{Datelike, NaiveDate};
use marketplace_core::environment::Clock;
use marketplace_core::ports::{
    AuditEntry, AuditLog, CatalogItem, CatalogLookup, CheckoutStore, Notification,
    NotificationDispatcher,
};
use marketplace_core::types::{
    Currency, InventoryUnit, LineItem, Money, Payment, Reservation,
    ReservationId, ReservationKind, ReservationRef, ReservationStatus, ResourceId, Ticket,
    UnitRequest,
};
use marketplace_core::{CheckoutError, RequestContext, StoreError};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Tries at releasing the hold of a purchase that did not complete.
const COMPENSATION_ATTEMPTS: u32 = 2;

/// One requested line: a resource and how many units of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseLine {
    /// Time slot, ticket tier or lead
    pub resource_id: ResourceId,
    /// Units wanted
    pub quantity: u32,
}

/// What the purchaser asked for. Amounts are never part of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Requested lines (several only for multi-tier ticket orders)
    pub lines: Vec<PurchaseLine>,
    /// Service date, required for time slots
    pub date: Option<NaiveDate>,
}

impl PurchaseRequest {
    /// The common single-resource purchase.
    #[must_use]
    pub fn single(resource_id: ResourceId, quantity: u32, date: Option<NaiveDate>) -> Self {
        Self {
            lines: vec![PurchaseLine {
                resource_id,
                quantity,
            }],
            date,
        }
    }
}

/// What the client needs to complete payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    /// Local reservation id
    pub reservation_id: ReservationId,
    /// Vertical
    pub reservation_kind: ReservationKind,
    /// Reservation status right after the purchase
    pub status: ReservationStatus,
    /// Gateway (or manual) order reference
    pub provider_order_id: String,
    /// Amount to pay
    pub amount: Money,
    /// Public gateway key for the checkout widget
    pub checkout_key: Option<String>,
    /// Gateway or manual settlement
    pub mode: CheckoutMode,
}

/// A reservation as its owner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationView {
    /// The reservation with its line items
    pub reservation: Reservation,
    /// Its payment
    pub payment: Payment,
    /// Issued tickets (ticket orders once confirmed)
    pub tickets: Vec<Ticket>,
}

/// Purchase limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRules {
    /// Currency every price must be in
    pub currency: Currency,
    /// Largest quantity on one line
    pub max_quantity: u32,
}

/// A validated line, priced from the catalog.
#[derive(Debug)]
struct PricedLine {
    unit: InventoryUnit,
    item: LineItem,
    amount: Money,
}

/// Coordinates ledger, payment intents and storage for a purchase.
#[derive(Clone)]
pub struct ReservationOrchestrator {
    catalog: Arc<dyn CatalogLookup>,
    inventory: InventoryService,
    intents: PaymentIntentManager,
    store: Arc<dyn CheckoutStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    rules: PurchaseRules,
}

impl std::fmt::Debug for ReservationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationOrchestrator")
            .field("intents", &self.intents)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl ReservationOrchestrator {
    /// Wire the orchestrator.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        inventory: InventoryService,
        intents: PaymentIntentManager,
        store: Arc<dyn CheckoutStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        rules: PurchaseRules,
    ) -> Self {
        Self {
            catalog,
            inventory,
            intents,
            store,
            notifier,
            audit,
            clock,
            rules,
        }
    }

    /// Purchase the requested resources for the authenticated caller.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Unauthenticated`] for anonymous callers
    /// - [`CheckoutError::Validation`] / [`CheckoutError::NotFound`] for bad requests
    /// - [`CheckoutError::CapacityExceeded`] when sold out (nothing held)
    /// - [`CheckoutError::PaymentGateway`] / [`CheckoutError::Storage`] after
    ///   the hold was released again
    #[tracing::instrument(
        skip(self, ctx, request),
        fields(user_id = tracing::field::Empty, lines = request.lines.len())
    )]
    pub async fn purchase(
        &self,
        ctx: &RequestContext,
        request: PurchaseRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let result = self.try_purchase(ctx, request).await;
        metrics::record_purchase(match &result {
            Ok(receipt) if receipt.mode == CheckoutMode::Manual => "confirmed",
            Ok(_) => "created",
            Err(CheckoutError::CapacityExceeded { .. }) => "capacity_exceeded",
            Err(CheckoutError::PaymentGateway(_)) => "gateway_error",
            Err(CheckoutError::Storage(_)) => "failed",
            Err(_) => "rejected",
        });
        result
    }

    async fn try_purchase(
        &self,
        ctx: &RequestContext,
        request: PurchaseRequest,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let user_id = ctx.require_user()?;
        tracing::Span::current().record("user_id", tracing::field::display(user_id));

        let (first, lines) = self.price(&request).await?;
        let service_date = if first.is_dated() { request.date } else { None };
        let total = lines
            .iter()
            .try_fold(Money::zero(self.rules.currency.clone()), |total, line| {
                total.checked_add(&line.amount)
            })
            .ok_or_else(|| CheckoutError::validation("order total is out of range"))?;
        if total.minor <= 0 {
            return Err(CheckoutError::validation("order total must be positive"));
        }

        let units: Vec<InventoryUnit> = lines.iter().map(|line| line.unit.clone()).collect();
        self.inventory.ensure_units(&units).await?;

        let reservation_id = ReservationId::new();
        let holds: Vec<UnitRequest> = lines
            .iter()
            .map(|line| UnitRequest {
                unit_id: line.unit.id,
                quantity: line.item.quantity,
            })
            .collect();
        self.inventory.reserve(reservation_id, &holds).await?;

        let purchase = PurchaseContext {
            user_id,
            vendor_id: first.vendor_id,
            parent_id: first.parent_id,
            reservation: ReservationRef {
                kind: first.kind,
                id: reservation_id,
            },
        };

        let intent = match self.intents.create_intent(&total, &purchase).await {
            Ok(intent) => intent,
            Err(e) => {
                self.compensate(reservation_id, &e).await;
                return Err(e.into());
            }
        };

        let now = self.clock.now();
        let reservation = Reservation {
            id: reservation_id,
            kind: first.kind,
            user_id,
            vendor_id: first.vendor_id,
            parent_id: first.parent_id,
            payment_id: intent.payment.id,
            status: intent.payment.status.reservation_status(),
            service_date,
            total: total.clone(),
            line_items: lines.into_iter().map(|line| line.item).collect(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.record_checkout(&intent.payment, &reservation).await {
            tracing::error!(
                %reservation_id,
                order_id = %intent.payment.provider_order_id,
                error = %e,
                "Failed to persist checkout"
            );
            self.compensate(reservation_id, &e).await;
            return Err(e.into());
        }

        tracing::info!(
            %reservation_id,
            kind = %reservation.kind,
            order_id = %intent.payment.provider_order_id,
            amount = total.minor,
            mode = intent.mode.as_str(),
            "Checkout created"
        );

        if intent.mode == CheckoutMode::Manual {
            self.settle_manually(&intent.payment, &reservation).await;
        }

        Ok(CheckoutReceipt {
            reservation_id,
            reservation_kind: reservation.kind,
            status: reservation.status,
            provider_order_id: intent.payment.provider_order_id,
            amount: total,
            checkout_key: intent.checkout_key,
            mode: intent.mode,
        })
    }

    /// Resolve, validate and price every line.
    async fn price(
        &self,
        request: &PurchaseRequest,
    ) -> Result<(CatalogItem, Vec<PricedLine>), CheckoutError> {
        if request.lines.is_empty() {
            return Err(CheckoutError::validation("at least one line is required"));
        }
        let mut seen = HashSet::new();
        for line in &request.lines {
            if line.quantity == 0 || line.quantity > self.rules.max_quantity {
                return Err(CheckoutError::validation(format!(
                    "quantity must be between 1 and {}",
                    self.rules.max_quantity
                )));
            }
            if !seen.insert(line.resource_id) {
                return Err(CheckoutError::validation(format!(
                    "resource {} appears more than once",
                    line.resource_id
                )));
            }
        }

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let item = self
                .catalog
                .resolve(line.resource_id)
                .await?
                .ok_or_else(|| CheckoutError::not_found("Resource", line.resource_id))?;
            self.check_eligible(&item, request.date)?;
            items.push((item, line.quantity));
        }

        let first = items
            .first()
            .map(|(item, _)| item.clone())
            .ok_or_else(|| CheckoutError::validation("at least one line is required"))?;
        if items.len() > 1 && first.kind != ReservationKind::TicketOrder {
            return Err(CheckoutError::validation(format!(
                "{} purchases take a single line",
                first.kind
            )));
        }

        let mut priced = Vec::with_capacity(items.len());
        for (item, quantity) in items {
            if item.kind != first.kind
                || item.parent_id != first.parent_id
                || item.vendor_id != first.vendor_id
            {
                return Err(CheckoutError::validation(
                    "all lines must belong to the same listing",
                ));
            }
            let service_date = if item.is_dated() { request.date } else { None };
            let amount = item.pricing.amount_for(quantity).ok_or_else(|| {
                CheckoutError::validation(format!("{} x {quantity} is out of range", item.name))
            })?;
            let unit = InventoryUnit::new(item.resource_id, service_date, item.capacity);
            priced.push(PricedLine {
                amount,
                item: LineItem {
                    unit_id: unit.id,
                    resource_id: item.resource_id,
                    quantity,
                    unit_price: item.pricing.quote().clone(),
                },
                unit,
            });
        }

        Ok((first, priced))
    }

    fn check_eligible(
        &self,
        item: &CatalogItem,
        date: Option<NaiveDate>,
    ) -> Result<(), CheckoutError> {
        let now = self.clock.now();

        if !item.published {
            return Err(CheckoutError::validation(format!(
                "{} is not available for purchase",
                item.name
            )));
        }
        if item.starts_at.is_some_and(|starts_at| starts_at <= now) {
            return Err(CheckoutError::validation(format!(
                "{} has already started",
                item.name
            )));
        }
        if item.pricing.quote().currency != self.rules.currency {
            return Err(CheckoutError::validation(format!(
                "{} is priced in {}, checkout accepts {}",
                item.name,
                item.pricing.quote().currency,
                self.rules.currency
            )));
        }

        if let Some(weekday) = item.weekday {
            let date =
                date.ok_or_else(|| CheckoutError::validation("a booking date is required"))?;
            if date < now.date_naive() {
                return Err(CheckoutError::validation("booking date is in the past"));
            }
            if date.weekday() != weekday {
                return Err(CheckoutError::validation(format!(
                    "{} only runs on {weekday}",
                    item.name
                )));
            }
        }

        Ok(())
    }

    /// Release the hold taken for a purchase that did not complete.
    async fn compensate(
        &self,
        reservation_id: ReservationId,
        cause: &(dyn std::fmt::Display + Sync),
    ) {
        tracing::warn!(
            %reservation_id,
            cause = %cause,
            "Purchase failed after hold, releasing inventory"
        );
        for attempt in 1..=COMPENSATION_ATTEMPTS {
            match self.inventory.release(reservation_id).await {
                Ok(_) => return,
                Err(e) => {
                    tracing::error!(
                        %reservation_id,
                        attempt,
                        error = %e,
                        "Compensating release failed"
                    );
                }
            }
        }
        // No reservation row references this hold. Sweepers must look for open
        // inventory_holds without a reservation to reclaim it.
        tracing::error!(%reservation_id, "Hold left open without a reservation");
    }

    /// Side effects of a purchase confirmed without a gateway.
    async fn settle_manually(&self, payment: &Payment, reservation: &Reservation) {
        metrics::record_payment(payment.status.as_str());

        sinks::audit(
            self.audit.as_ref(),
            AuditEntry {
                action: "payment.manual_capture".to_string(),
                subject: payment.id.to_string(),
                detail: json!({
                    "reservation_id": reservation.id,
                    "reservation_kind": reservation.kind,
                    "order_id": payment.provider_order_id,
                    "amount_minor": payment.amount.minor,
                    "currency": payment.amount.currency,
                }),
                at: payment.updated_at,
            },
        )
        .await;

        sinks::notify(
            self.notifier.as_ref(),
            Notification::ReservationConfirmed {
                reservation_id: reservation.id,
                kind: reservation.kind,
                user_id: reservation.user_id,
                vendor_id: reservation.vendor_id,
            },
        )
        .await;
    }

    /// Current state of one of the caller's reservations.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Unauthenticated`] for anonymous callers
    /// - [`CheckoutError::NotFound`] if the reservation does not exist or
    ///   belongs to someone else
    /// - [`CheckoutError::Storage`] on storage failure
    #[tracing::instrument(skip(self, ctx))]
    pub async fn reservation_status(
        &self,
        ctx: &RequestContext,
        reservation_id: ReservationId,
    ) -> Result<ReservationView, CheckoutError> {
        let user_id = ctx.require_user()?;

        let reservation = self
            .store
            .reservation(reservation_id)
            .await?
            .filter(|reservation| reservation.user_id == user_id)
            .ok_or_else(|| CheckoutError::not_found("Reservation", reservation_id))?;

        let payment = self.store.payment(reservation.payment_id).await?.ok_or_else(|| {
            StoreError::Corrupt(format!(
                "reservation {reservation_id} references missing payment {}",
                reservation.payment_id
            ))
        })?;

        let tickets = self.store.tickets(reservation_id).await?;

        Ok(ReservationView {
            reservation,
            payment,
            tickets,
        })
    }
}
