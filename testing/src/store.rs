//! In-memory storage adapter.
//!
//! Implements every storage port from `marketplace-core` over one mutex-guarded
//! state, so each port call is atomic exactly like the single statement or
//! transaction of the `PostgreSQL` adapter. Failure injection switches let tests
//! exercise compensation and redelivery paths.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marketplace_core::StoreError;
use marketplace_core::ports::{
    CaptureCommand, CatalogItem, CatalogLookup, CheckoutStore, FailureCommand, InventoryLedger,
    RecordOutcome, RefundCommand, ReleaseOutcome, ReserveOutcome, Transition, WebhookEventStore,
};
use marketplace_core::types::{
    InventoryUnit, InventoryUnitId, Payment, PaymentId, PaymentStatus, Reservation, ReservationId,
    ReservationKind, ReservationStatus, ResourceId, Ticket, TicketId, UnitRequest,
    WebhookEventRecord,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
struct Hold {
    quantity: u32,
    released: bool,
}

#[derive(Debug, Clone)]
struct IssuedTicket {
    ticket: Ticket,
    voided: bool,
}

#[derive(Debug, Default)]
struct State {
    catalog: HashMap<ResourceId, CatalogItem>,
    units: HashMap<InventoryUnitId, InventoryUnit>,
    holds: HashMap<(ReservationId, InventoryUnitId), Hold>,
    payments: HashMap<PaymentId, Payment>,
    reservations: HashMap<ReservationId, Reservation>,
    tickets: Vec<IssuedTicket>,
    webhook_events: HashMap<String, WebhookEventRecord>,
}

#[derive(Debug, Default)]
struct FailureSwitches {
    record_checkout: AtomicBool,
    transition: AtomicBool,
    release: AtomicBool,
    unavailable: AtomicBool,
}

/// In-memory implementation of all storage ports.
///
/// Cloning shares the underlying state.
///
/// # Example
///
/// ```
/// use marketplace_testing::InMemoryStore;
/// use marketplace_core::ports::InventoryLedger;
/// use marketplace_core::types::{InventoryUnit, ReservationId, ResourceId, UnitRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let unit = InventoryUnit::new(ResourceId::new(), None, 5);
/// store.ensure_unit(&unit).await?;
///
/// let lines = [UnitRequest { unit_id: unit.id, quantity: 2 }];
/// store.check_and_reserve(ReservationId::new(), &lines).await?;
/// assert_eq!(store.committed(unit.id), Some(2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    failures: Arc<FailureSwitches>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog entry.
    pub fn add_catalog_item(&self, item: CatalogItem) {
        self.state.lock().unwrap().catalog.insert(item.resource_id, item);
    }

    /// Committed count of a counter, `None` if it does not exist.
    #[must_use]
    pub fn committed(&self, unit_id: InventoryUnitId) -> Option<u32> {
        self.state.lock().unwrap().units.get(&unit_id).map(|unit| unit.committed)
    }

    /// Number of stored payments.
    #[must_use]
    pub fn payment_count(&self) -> usize {
        self.state.lock().unwrap().payments.len()
    }

    /// Number of stored reservations.
    #[must_use]
    pub fn reservation_count(&self) -> usize {
        self.state.lock().unwrap().reservations.len()
    }

    /// All stored reservations.
    #[must_use]
    pub fn reservations(&self) -> Vec<Reservation> {
        self.state.lock().unwrap().reservations.values().cloned().collect()
    }

    /// All stored payments.
    #[must_use]
    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.values().cloned().collect()
    }

    /// A ledger entry by event id.
    #[must_use]
    pub fn webhook_event(&self, event_id: &str) -> Option<WebhookEventRecord> {
        self.state.lock().unwrap().webhook_events.get(event_id).cloned()
    }

    /// Number of ledger entries.
    #[must_use]
    pub fn webhook_event_count(&self) -> usize {
        self.state.lock().unwrap().webhook_events.len()
    }

    /// Make the next `record_checkout` fail.
    pub fn fail_next_record_checkout(&self) {
        self.failures.record_checkout.store(true, Ordering::SeqCst);
    }

    /// Make the next payment transition (capture/fail/refund) fail.
    pub fn fail_next_transition(&self) {
        self.failures.transition.store(true, Ordering::SeqCst);
    }

    /// Make the next `release_reservation` fail.
    pub fn fail_next_release(&self) {
        self.failures.release.store(true, Ordering::SeqCst);
    }

    /// Make `ping` fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.failures.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn injected(switch: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        if switch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Database(format!("injected failure: {operation}")));
        }
        Ok(())
    }
}

impl State {
    fn issue_tickets(&mut self, reservation: &Reservation) -> u32 {
        let mut issued = 0;
        for item in &reservation.line_items {
            for _ in 0..item.quantity {
                let id = TicketId::new();
                self.tickets.push(IssuedTicket {
                    ticket: Ticket {
                        id,
                        reservation_id: reservation.id,
                        unit_id: item.unit_id,
                        code: id.as_uuid().simple().to_string(),
                    },
                    voided: false,
                });
                issued += 1;
            }
        }
        issued
    }

    fn void_tickets(&mut self, reservation_id: ReservationId) -> u32 {
        let mut voided = 0;
        for issued in &mut self.tickets {
            if issued.ticket.reservation_id == reservation_id && !issued.voided {
                issued.voided = true;
                voided += 1;
            }
        }
        voided
    }

    fn payment_id_by(&self, matches: impl Fn(&Payment) -> bool) -> Option<PaymentId> {
        self.payments.values().find(|p| matches(p)).map(|p| p.id)
    }

    /// Move a payment and its reservation together, if the payment is in `from`.
    fn transition(
        &mut self,
        payment_id: Option<PaymentId>,
        from: PaymentStatus,
        to: PaymentStatus,
        provider_payment_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::Conflict(format!(
                "payment transition {from} -> {to} is not allowed"
            )));
        }
        let Some(payment_id) = payment_id else {
            return Ok(Transition::UnknownPayment);
        };
        let payment = self
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt(format!("payment {payment_id} vanished")))?;
        if payment.status != from {
            return Ok(Transition::Unchanged { payment });
        }

        let reservation_id = payment.reservation.id;
        let mut reservation = self.reservations.get(&reservation_id).cloned().ok_or_else(|| {
            StoreError::Corrupt(format!("payment {payment_id} has no reservation {reservation_id}"))
        })?;

        let mut payment = payment;
        payment.status = to;
        payment.updated_at = at;
        if let Some(provider_payment_id) = provider_payment_id {
            payment.provider_payment_id = Some(provider_payment_id.to_string());
        }

        let next = to.reservation_status();
        if reservation.status != next && reservation.status != ReservationStatus::Cancelled {
            reservation.status = next;
            reservation.updated_at = at;
        }

        let is_ticket_order = reservation.kind == ReservationKind::TicketOrder;
        let tickets_issued = if to == PaymentStatus::Captured && is_ticket_order {
            self.issue_tickets(&reservation)
        } else {
            0
        };
        let tickets_voided = if to == PaymentStatus::Refunded && is_ticket_order {
            self.void_tickets(reservation_id)
        } else {
            0
        };

        self.payments.insert(payment_id, payment.clone());
        self.reservations.insert(reservation_id, reservation.clone());

        Ok(Transition::Applied {
            payment,
            reservation,
            tickets_issued,
            tickets_voided,
        })
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn ensure_unit(&self, unit: &InventoryUnit) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .units
            .entry(unit.id)
            .or_insert_with(|| unit.clone());
        Ok(())
    }

    async fn check_and_reserve(
        &self,
        reservation_id: ReservationId,
        lines: &[UnitRequest],
    ) -> Result<ReserveOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();

        let mut requested: BTreeMap<InventoryUnitId, u32> = BTreeMap::new();
        for line in lines {
            *requested.entry(line.unit_id).or_default() += line.quantity;
        }

        for (&unit_id, &quantity) in &requested {
            if state.holds.contains_key(&(reservation_id, unit_id)) {
                return Err(StoreError::Conflict(format!(
                    "reservation {reservation_id} already holds unit {unit_id}"
                )));
            }
            let Some(unit) = state.units.get(&unit_id) else {
                return Ok(ReserveOutcome::UnknownUnit(unit_id));
            };
            if unit.committed.saturating_add(quantity) > unit.capacity {
                return Ok(ReserveOutcome::InsufficientCapacity {
                    unit_id,
                    requested: quantity,
                    remaining: unit.remaining(),
                });
            }
        }

        for (unit_id, quantity) in requested {
            if let Some(unit) = state.units.get_mut(&unit_id) {
                unit.committed += quantity;
            }
            state.holds.insert(
                (reservation_id, unit_id),
                Hold {
                    quantity,
                    released: false,
                },
            );
        }

        Ok(ReserveOutcome::Reserved)
    }

    async fn release_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReleaseOutcome, StoreError> {
        Self::injected(&self.failures.release, "release_reservation")?;
        let mut state = self.state.lock().unwrap();

        let payment_id = state.payment_id_by(|p| p.reservation.id == reservation_id);
        let State {
            payments,
            reservations,
            holds,
            units,
            ..
        } = &mut *state;

        if let Some(payment) = payment_id.and_then(|id| payments.get_mut(&id)) {
            match payment.status {
                PaymentStatus::Captured => return Ok(ReleaseOutcome::Paid),
                PaymentStatus::Pending => {
                    let now = Utc::now();
                    payment.status = PaymentStatus::Failed;
                    payment.updated_at = now;
                    if let Some(reservation) = reservations
                        .get_mut(&reservation_id)
                        .filter(|r| r.status == ReservationStatus::Pending)
                    {
                        reservation.status = ReservationStatus::Cancelled;
                        reservation.updated_at = now;
                    }
                }
                PaymentStatus::Failed | PaymentStatus::Refunded => {}
            }
        }

        let mut released = 0;
        for ((holder, unit_id), hold) in holds.iter_mut() {
            if *holder != reservation_id || hold.released {
                continue;
            }
            hold.released = true;
            released += hold.quantity;
            if let Some(unit) = units.get_mut(unit_id) {
                unit.committed = unit.committed.saturating_sub(hold.quantity);
            }
        }

        if released == 0 {
            Ok(ReleaseOutcome::NothingHeld)
        } else {
            Ok(ReleaseOutcome::Released { units: released })
        }
    }

    async fn unit(&self, unit_id: InventoryUnitId) -> Result<Option<InventoryUnit>, StoreError> {
        Ok(self.state.lock().unwrap().units.get(&unit_id).cloned())
    }
}

#[async_trait]
impl CheckoutStore for InMemoryStore {
    async fn record_checkout(
        &self,
        payment: &Payment,
        reservation: &Reservation,
    ) -> Result<(), StoreError> {
        Self::injected(&self.failures.record_checkout, "record_checkout")?;
        let mut state = self.state.lock().unwrap();

        if state
            .payment_id_by(|p| p.provider_order_id == payment.provider_order_id)
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "provider order {} already recorded",
                payment.provider_order_id
            )));
        }
        if state.payments.contains_key(&payment.id)
            || state.reservations.contains_key(&reservation.id)
        {
            return Err(StoreError::Conflict(format!(
                "checkout for reservation {} already recorded",
                reservation.id
            )));
        }

        state.payments.insert(payment.id, payment.clone());
        state.reservations.insert(reservation.id, reservation.clone());
        if reservation.status == ReservationStatus::Confirmed
            && reservation.kind == ReservationKind::TicketOrder
        {
            state.issue_tickets(reservation);
        }
        Ok(())
    }

    async fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.state.lock().unwrap().payments.get(&payment_id).cloned())
    }

    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        Ok(self.state.lock().unwrap().reservations.get(&reservation_id).cloned())
    }

    async fn capture_payment(&self, command: &CaptureCommand) -> Result<Transition, StoreError> {
        Self::injected(&self.failures.transition, "capture_payment")?;
        let mut state = self.state.lock().unwrap();
        let payment_id = state.payment_id_by(|p| p.provider_order_id == command.provider_order_id);
        state.transition(
            payment_id,
            PaymentStatus::Pending,
            PaymentStatus::Captured,
            Some(&command.provider_payment_id),
            command.at,
        )
    }

    async fn fail_payment(&self, command: &FailureCommand) -> Result<Transition, StoreError> {
        Self::injected(&self.failures.transition, "fail_payment")?;
        let mut state = self.state.lock().unwrap();
        let payment_id = state.payment_id_by(|p| p.provider_order_id == command.provider_order_id);
        state.transition(
            payment_id,
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            None,
            command.at,
        )
    }

    async fn refund_payment(&self, command: &RefundCommand) -> Result<Transition, StoreError> {
        Self::injected(&self.failures.transition, "refund_payment")?;
        let mut state = self.state.lock().unwrap();
        let payment_id = state.payment_id_by(|p| {
            p.provider_payment_id.as_deref() == Some(command.provider_payment_id.as_str())
        });
        state.transition(
            payment_id,
            PaymentStatus::Captured,
            PaymentStatus::Refunded,
            None,
            command.at,
        )
    }

    async fn tickets(&self, reservation_id: ReservationId) -> Result<Vec<Ticket>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter()
            .filter(|issued| issued.ticket.reservation_id == reservation_id && !issued.voided)
            .map(|issued| issued.ticket.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.failures.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryStore {
    async fn find(&self, event_id: &str) -> Result<Option<WebhookEventRecord>, StoreError> {
        Ok(self.webhook_event(event_id))
    }

    async fn record(&self, event: &WebhookEventRecord) -> Result<RecordOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.webhook_events.contains_key(&event.event_id) {
            return Ok(RecordOutcome::Duplicate);
        }
        state
            .webhook_events
            .insert(event.event_id.clone(), event.clone());
        Ok(RecordOutcome::Inserted)
    }

    async fn mark_processed(&self, event_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(event) = state.webhook_events.get_mut(event_id) {
            event.processed = true;
            event.processed_at = Some(at);
        }
        Ok(())
    }

    async fn unprocessed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<_> = state
            .webhook_events
            .values()
            .filter(|event| !event.processed)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        events.truncate(limit as usize);
        Ok(events)
    }
}

#[async_trait]
impl CatalogLookup for InMemoryStore {
    async fn resolve(&self, resource_id: ResourceId) -> Result<Option<CatalogItem>, StoreError> {
        Ok(self.state.lock().unwrap().catalog.get(&resource_id).cloned())
    }
}
