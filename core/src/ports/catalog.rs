//! Catalog lookup port (read-only view of vendor-managed resources).

use crate::error::StoreError;
use crate::types::{Money, ReservationKind, ResourceId, VendorId};
use async_trait::async_trait;
use chrono::{DateTime, Utc, Weekday};

/// How a resource is priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pricing {
    /// Price multiplied by quantity (ticket tiers).
    PerUnit(Money),
    /// One fee regardless of quantity (booking fee, lead unlock fee).
    Flat(Money),
}

impl Pricing {
    /// Price quoted per unit or per purchase.
    #[must_use]
    pub const fn quote(&self) -> &Money {
        match self {
            Self::PerUnit(price) | Self::Flat(price) => price,
        }
    }

    /// Amount due for `quantity` units, `None` on overflow.
    #[must_use]
    pub fn amount_for(&self, quantity: u32) -> Option<Money> {
        match self {
            Self::PerUnit(price) => price.checked_mul(quantity),
            Self::Flat(fee) => Some(fee.clone()),
        }
    }
}

/// A purchasable resource as the catalog sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Resource id (time slot, ticket tier, lead)
    pub resource_id: ResourceId,
    /// Vertical a purchase of this resource creates
    pub kind: ReservationKind,
    /// Vendor selling the resource
    pub vendor_id: VendorId,
    /// Restaurant, event or lead the resource belongs to
    pub parent_id: ResourceId,
    /// Display name
    pub name: String,
    /// Price
    pub pricing: Pricing,
    /// Total consumable units per counter
    pub capacity: u32,
    /// Whether the vendor published it
    pub published: bool,
    /// Start of the event, for one-off resources
    pub starts_at: Option<DateTime<Utc>>,
    /// Day of week a recurring time slot runs on
    pub weekday: Option<Weekday>,
}

impl CatalogItem {
    /// Whether purchases need a service date (recurring time slots).
    #[must_use]
    pub const fn is_dated(&self) -> bool {
        self.weekday.is_some()
    }
}

/// Resolves resource ids against the vendor catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Look up a resource.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails; unknown ids are `Ok(None)`.
    async fn resolve(&self, resource_id: ResourceId) -> Result<Option<CatalogItem>, StoreError>;
}
