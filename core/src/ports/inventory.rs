//! Inventory ledger port.
//!
//! The ledger is the only writer of capacity counters. Implementations must make
//! [`InventoryLedger::check_and_reserve`] a single atomic conditional update (or a
//! serializable transaction): two concurrent callers must never both observe the
//! same remaining capacity and both succeed.

use crate::error::StoreError;
use crate::types::{InventoryUnit, InventoryUnitId, ReservationId, UnitRequest};
use async_trait::async_trait;

/// Result of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Every requested line is now held for the reservation.
    Reserved,
    /// A line did not fit; nothing was held.
    InsufficientCapacity {
        /// First counter that did not fit
        unit_id: InventoryUnitId,
        /// Units requested from it
        requested: u32,
        /// Units it had left
        remaining: u32,
    },
    /// A requested counter does not exist; nothing was held.
    UnknownUnit(InventoryUnitId),
}

/// Result of releasing a reservation's holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Holds were returned to the pool.
    Released {
        /// Total units returned
        units: u32,
    },
    /// Nothing was held (never reserved, or already released).
    NothingHeld,
    /// The reservation's payment is captured; its holds stay in place.
    Paid,
}

/// Strongly consistent capacity counters.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Create the counter if it does not exist yet. Never alters an existing
    /// counter's capacity or committed count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage write fails.
    async fn ensure_unit(&self, unit: &InventoryUnit) -> Result<(), StoreError>;

    /// Atomically hold every requested line for `reservation_id`, or none.
    ///
    /// Holds are keyed by `(reservation_id, unit_id)`; `committed + requested`
    /// must stay `<= capacity` for every line.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on storage failure. Insufficient capacity is an
    /// [`ReserveOutcome`], not an error.
    async fn check_and_reserve(
        &self,
        reservation_id: ReservationId,
        lines: &[UnitRequest],
    ) -> Result<ReserveOutcome, StoreError>;

    /// Return every still-held line of `reservation_id` to the pool.
    ///
    /// Safe to call repeatedly: only the first call releases anything. This is
    /// the contract compensation paths and expiry sweepers call.
    ///
    /// A reservation whose payment is still `pending` is expired in the same
    /// transaction (payment `failed`, reservation `cancelled`), so a capture
    /// arriving later cannot confirm it without inventory. A reservation whose
    /// payment is `captured` keeps its holds and gets [`ReleaseOutcome::Paid`].
    /// Sweepers scan both pending reservations and open holds that have no
    /// reservation row (a checkout whose compensation failed).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage write fails.
    async fn release_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReleaseOutcome, StoreError>;

    /// Snapshot of a counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the storage read fails.
    async fn unit(&self, unit_id: InventoryUnitId) -> Result<Option<InventoryUnit>, StoreError>;
}
