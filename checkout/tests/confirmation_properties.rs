//! Property tests for webhook reconciliation.
//!
//! Arbitrary sequences of captures, failures, refunds and redeliveries
//! (event ids are drawn from a small pool so collisions are common) must
//! leave payment, reservation, inventory and notifications in agreement with
//! a plain state-machine model.
//!
//! Run with: `cargo test --test confirmation_properties`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use common::{Harness, buyer, order_paid, payment_captured, payment_failed, refund_processed};
use marketplace_checkout::PurchaseRequest;
use marketplace_core::ports::Notification;
use marketplace_core::types::{InventoryUnitId, PaymentStatus, ReservationStatus};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
enum Event {
    Captured,
    OrderPaid,
    Failed,
    Refunded,
}

fn event() -> impl Strategy<Value = (Event, u8)> {
    (
        prop_oneof![
            Just(Event::Captured),
            Just(Event::OrderPaid),
            Just(Event::Failed),
            Just(Event::Refunded),
        ],
        0_u8..6,
    )
}

/// Expected payment status after applying `events` in order.
fn model(events: &[(Event, u8)]) -> PaymentStatus {
    let mut seen = HashSet::new();
    let mut status = PaymentStatus::Pending;
    for &(event, id) in events {
        if !seen.insert(id) {
            continue;
        }
        status = match (status, event) {
            (PaymentStatus::Pending, Event::Captured | Event::OrderPaid) => PaymentStatus::Captured,
            (PaymentStatus::Pending, Event::Failed) => PaymentStatus::Failed,
            (PaymentStatus::Captured, Event::Refunded) => PaymentStatus::Refunded,
            (unchanged, _) => unchanged,
        };
    }
    status
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reservation_confirmed_iff_payment_captured(
        events in prop::collection::vec(event(), 0..12)
    ) {
        tokio_test::block_on(async {
            let harness = Harness::new();
            let tier = harness.ticket_tier(4, 1_000);
            let unit_id = InventoryUnitId::for_resource(tier.resource_id, None);
            let receipt = harness
                .orchestrator()
                .purchase(&buyer(), PurchaseRequest::single(tier.resource_id, 3, None))
                .await
                .unwrap();
            let order_id = receipt.provider_order_id;

            for &(event, id) in &events {
                let body = match event {
                    Event::Captured => payment_captured(&order_id, "pay_1"),
                    Event::OrderPaid => order_paid(&order_id, "pay_1"),
                    Event::Failed => payment_failed(&order_id),
                    Event::Refunded => refund_processed("pay_1"),
                };
                harness.deliver(&format!("evt_{id}"), &body).await.unwrap();
            }

            let expected = model(&events);
            let payment = harness.store.payments()[0].clone();
            let reservation = harness.store.reservations()[0].clone();

            prop_assert_eq!(payment.status, expected);
            prop_assert_eq!(
                reservation.status == ReservationStatus::Confirmed,
                payment.status == PaymentStatus::Captured
            );
            prop_assert_eq!(reservation.status, expected.reservation_status());

            let held = harness.store.committed(unit_id).unwrap();
            let expected_held = match expected {
                PaymentStatus::Pending | PaymentStatus::Captured => 3,
                PaymentStatus::Failed | PaymentStatus::Refunded => 0,
            };
            prop_assert_eq!(held, expected_held);

            let sent = harness.notifier.sent();
            let confirmed = sent
                .iter()
                .filter(|n| matches!(n, Notification::ReservationConfirmed { .. }))
                .count();
            let cancelled = sent
                .iter()
                .filter(|n| matches!(n, Notification::ReservationCancelled { .. }))
                .count();
            prop_assert_eq!(
                confirmed,
                usize::from(matches!(expected, PaymentStatus::Captured | PaymentStatus::Refunded))
            );
            prop_assert_eq!(
                cancelled,
                usize::from(matches!(expected, PaymentStatus::Failed | PaymentStatus::Refunded))
            );

            let distinct_ids: HashSet<u8> = events.iter().map(|&(_, id)| id).collect();
            prop_assert_eq!(harness.store.webhook_event_count(), distinct_ids.len());
            Ok(())
        })?;
    }
}
