//! Catalog builders for the three verticals.
//!
//! Every builder returns a published item; tweak the fields afterwards for
//! eligibility tests.

use chrono::Weekday;
use marketplace_core::ports::{CatalogItem, Pricing};
use marketplace_core::types::{Currency, Money, ReservationKind, ResourceId, VendorId};

/// A restaurant time slot recurring on `weekday`, charging a flat booking fee.
#[must_use]
pub fn time_slot(
    restaurant_id: ResourceId,
    weekday: Weekday,
    capacity: u32,
    booking_fee_minor: i64,
    currency: &Currency,
) -> CatalogItem {
    CatalogItem {
        resource_id: ResourceId::new(),
        kind: ReservationKind::Booking,
        vendor_id: VendorId::new(),
        parent_id: restaurant_id,
        name: format!("{weekday} dinner"),
        pricing: Pricing::Flat(Money::from_minor(booking_fee_minor, currency.clone())),
        capacity,
        published: true,
        starts_at: None,
        weekday: Some(weekday),
    }
}

/// A ticket tier of `event_id`, priced per ticket.
#[must_use]
pub fn ticket_tier(
    event_id: ResourceId,
    capacity: u32,
    price_minor: i64,
    currency: &Currency,
) -> CatalogItem {
    CatalogItem {
        resource_id: ResourceId::new(),
        kind: ReservationKind::TicketOrder,
        vendor_id: VendorId::new(),
        parent_id: event_id,
        name: "General admission".to_string(),
        pricing: Pricing::PerUnit(Money::from_minor(price_minor, currency.clone())),
        capacity,
        published: true,
        starts_at: None,
        weekday: None,
    }
}

/// A party-hall lead that `capacity` vendors may unlock for a flat fee.
#[must_use]
pub fn lead(capacity: u32, unlock_fee_minor: i64, currency: &Currency) -> CatalogItem {
    let lead_id = ResourceId::new();
    CatalogItem {
        resource_id: lead_id,
        kind: ReservationKind::LeadUnlock,
        vendor_id: VendorId::new(),
        parent_id: lead_id,
        name: "Wedding reception, 200 guests".to_string(),
        pricing: Pricing::Flat(Money::from_minor(unlock_fee_minor, currency.clone())),
        capacity,
        published: true,
        starts_at: None,
        weekday: None,
    }
}

/// A second tier of the same event, sharing the vendor of `tier`.
#[must_use]
pub fn sibling_tier(tier: &CatalogItem, capacity: u32, price_minor: i64) -> CatalogItem {
    CatalogItem {
        resource_id: ResourceId::new(),
        name: "VIP".to_string(),
        pricing: Pricing::PerUnit(Money::from_minor(
            price_minor,
            tier.pricing.quote().currency.clone(),
        )),
        capacity,
        ..tier.clone()
    }
}
