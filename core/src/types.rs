//! Domain types for marketplace checkout.
//!
//! Value objects and entities shared by the inventory ledger, the payment intent
//! manager, the reservation orchestrator and the webhook reconciler.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an authenticated user (purchaser)
    UserId
);
define_id!(
    /// Unique identifier for a vendor
    VendorId
);
define_id!(
    /// Unique identifier for a catalog resource (time slot, ticket tier, lead, ...)
    ResourceId
);
define_id!(
    /// Unique identifier for a local payment record
    PaymentId
);
define_id!(
    /// Unique identifier for a reservation (booking, ticket order or lead unlock)
    ReservationId
);
define_id!(
    /// Unique identifier for an issued ticket
    TicketId
);
define_id!(
    /// Unique identifier for a capacity counter
    InventoryUnitId
);

/// Namespace for deterministic inventory unit ids.
const INVENTORY_UNIT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a7e_93d4_4b8a_a1f0_5c3e_7d92_0b41);

impl InventoryUnitId {
    /// Derive the capacity counter id for a resource on a service date.
    ///
    /// Recurring time slots have one counter per date; ticket tiers and leads
    /// have a single undated counter. The id is stable across processes.
    #[must_use]
    pub fn for_resource(resource_id: ResourceId, service_date: Option<NaiveDate>) -> Self {
        let name = match service_date {
            Some(date) => format!("{resource_id}/{date}"),
            None => resource_id.to_string(),
        };
        Self(Uuid::new_v5(&INVENTORY_UNIT_NAMESPACE, name.as_bytes()))
    }
}

// ============================================================================
// Money
// ============================================================================

/// ISO 4217 currency code (upper-case, three letters).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse a currency code.
    ///
    /// # Errors
    ///
    /// Returns the rejected input if it is not three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, String> {
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(format!("invalid currency code: {code:?}"))
        }
    }

    /// Indian rupee
    #[must_use]
    pub fn inr() -> Self {
        Self("INR".to_string())
    }

    /// The currency code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount in minor currency units (paise, cents).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units
    pub minor: i64,
    /// Currency of the amount
    pub currency: Currency,
}

impl Money {
    /// Creates an amount from minor units.
    #[must_use]
    pub const fn from_minor(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Multiply by a quantity, `None` on overflow.
    #[must_use]
    pub fn checked_mul(&self, quantity: u32) -> Option<Self> {
        self.minor
            .checked_mul(i64::from(quantity))
            .map(|minor| Self::from_minor(minor, self.currency.clone()))
    }

    /// Add another amount, `None` on overflow or currency mismatch.
    #[must_use]
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        if self.currency != other.currency {
            return None;
        }
        self.minor
            .checked_add(other.minor)
            .map(|minor| Self::from_minor(minor, self.currency.clone()))
    }

    /// Zero in the given currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.minor, self.currency)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Error returned when a stored discriminant cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// Rejected value
    pub value: String,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Database / wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parse from the database / wire representation.
            ///
            /// # Errors
            ///
            /// Returns [`UnknownVariant`] if the string doesn't match a known value.
            pub fn parse(s: &str) -> Result<Self, UnknownVariant> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant { kind: $label, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Vertical a reservation belongs to.
    ReservationKind, "reservation kind" {
        /// Restaurant table booking
        Booking => "booking",
        /// Nightclub event ticket order
        TicketOrder => "ticket_order",
        /// Party-hall lead unlock
        LeadUnlock => "lead_unlock",
    }
);

string_enum!(
    /// Lifecycle of a payment attempt.
    PaymentStatus, "payment status" {
        /// Gateway order created, awaiting capture
        Pending => "pending",
        /// Funds captured
        Captured => "captured",
        /// Payment failed
        Failed => "failed",
        /// Captured funds returned
        Refunded => "refunded",
    }
);

string_enum!(
    /// Lifecycle of a reservation.
    ReservationStatus, "reservation status" {
        /// Awaiting payment capture
        Pending => "pending",
        /// Payment captured
        Confirmed => "confirmed",
        /// Payment failed, refunded or abandoned
        Cancelled => "cancelled",
    }
);

string_enum!(
    /// Who processed the payment.
    PaymentProvider, "payment provider" {
        /// Razorpay payment gateway
        Razorpay => "razorpay",
        /// No gateway configured; settled out of band
        Manual => "manual",
    }
);

impl PaymentStatus {
    /// Whether moving from `self` to `next` respects the monotonic lifecycle
    /// (pending → captured | failed, captured → refunded).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Captured | Self::Failed) | (Self::Captured, Self::Refunded)
        )
    }

    /// The reservation status implied by this payment status.
    #[must_use]
    pub const fn reservation_status(self) -> ReservationStatus {
        match self {
            Self::Pending => ReservationStatus::Pending,
            Self::Captured => ReservationStatus::Confirmed,
            Self::Failed | Self::Refunded => ReservationStatus::Cancelled,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Typed reference from a payment to the reservation it pays for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationRef {
    /// Vertical of the reservation
    pub kind: ReservationKind,
    /// Reservation id
    pub id: ReservationId,
}

/// A consumable capacity counter (time slot seats on a date, ticket tier stock).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    /// Counter id
    pub id: InventoryUnitId,
    /// Catalog resource the counter belongs to
    pub resource_id: ResourceId,
    /// Service date for dated resources
    pub service_date: Option<NaiveDate>,
    /// Total consumable units
    pub capacity: u32,
    /// Units held by non-cancelled reservations
    pub committed: u32,
}

impl InventoryUnit {
    /// A fresh, empty counter for a resource.
    #[must_use]
    pub fn new(resource_id: ResourceId, service_date: Option<NaiveDate>, capacity: u32) -> Self {
        Self {
            id: InventoryUnitId::for_resource(resource_id, service_date),
            resource_id,
            service_date,
            capacity,
            committed: 0,
        }
    }

    /// Units still available.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.committed)
    }
}

/// Request to hold `quantity` units of one counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRequest {
    /// Counter to reserve from
    pub unit_id: InventoryUnitId,
    /// Units requested
    pub quantity: u32,
}

/// One external payment attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Local id
    pub id: PaymentId,
    /// Amount charged
    pub amount: Money,
    /// Provider processing the payment
    pub provider: PaymentProvider,
    /// Gateway order reference (unique)
    pub provider_order_id: String,
    /// Gateway payment reference, set on capture
    pub provider_payment_id: Option<String>,
    /// Current status
    pub status: PaymentStatus,
    /// Purchasing user
    pub user_id: UserId,
    /// Reservation this payment pays for
    pub reservation: ReservationRef,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// One purchased line of a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Counter consumed
    pub unit_id: InventoryUnitId,
    /// Catalog resource purchased
    pub resource_id: ResourceId,
    /// Units purchased
    pub quantity: u32,
    /// Price per unit (or the flat fee for single-fee resources)
    pub unit_price: Money,
}

/// A domain purchase record: booking, ticket order or lead unlock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation id
    pub id: ReservationId,
    /// Vertical
    pub kind: ReservationKind,
    /// Purchasing user
    pub user_id: UserId,
    /// Vendor being paid
    pub vendor_id: VendorId,
    /// Restaurant, event or lead the purchase belongs to
    pub parent_id: ResourceId,
    /// Linked payment (1:1)
    pub payment_id: PaymentId,
    /// Current status
    pub status: ReservationStatus,
    /// Service date for bookings
    pub service_date: Option<NaiveDate>,
    /// Total charged
    pub total: Money,
    /// What was purchased
    pub line_items: Vec<LineItem>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Total units across all line items.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.line_items.iter().map(|item| item.quantity).sum()
    }
}

/// An admission ticket issued when a ticket order is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id
    pub id: TicketId,
    /// Order the ticket belongs to
    pub reservation_id: ReservationId,
    /// Tier counter the ticket was drawn from
    pub unit_id: InventoryUnitId,
    /// Scannable code
    pub code: String,
}

/// Entry in the webhook idempotency ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    /// Provider-assigned unique event id
    pub event_id: String,
    /// Provider that sent the callback
    pub provider: PaymentProvider,
    /// Provider event type (e.g. `payment.captured`)
    pub event_type: String,
    /// Raw payload
    pub payload: serde_json::Value,
    /// Whether the business transition completed
    pub processed: bool,
    /// When the callback was first received
    pub received_at: DateTime<Utc>,
    /// When processing completed
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEventRecord {
    /// A freshly received, unprocessed event.
    #[must_use]
    pub fn received(
        event_id: impl Into<String>,
        provider: PaymentProvider,
        event_type: impl Into<String>,
        payload: serde_json::Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            provider,
            event_type: event_type.into(),
            payload,
            processed: false,
            received_at,
            processed_at: None,
        }
    }
}
