//! Inventory ledger service.
//!
//! Thin layer over the [`InventoryLedger`] port that translates reservation
//! outcomes into the checkout error taxonomy and records metrics. The
//! atomicity lives in the storage adapter, not here.

use crate::metrics;
use marketplace_core::ports::{InventoryLedger, ReleaseOutcome, ReserveOutcome};
use marketplace_core::types::{InventoryUnit, ReservationId, UnitRequest};
use marketplace_core::{CheckoutError, StoreError};
use std::sync::Arc;

/// Capacity reservation for the orchestrator and the reconciler.
#[derive(Clone)]
pub struct InventoryService {
    ledger: Arc<dyn InventoryLedger>,
}

impl InventoryService {
    /// Wrap a ledger adapter.
    #[must_use]
    pub fn new(ledger: Arc<dyn InventoryLedger>) -> Self {
        Self { ledger }
    }

    /// Materialise the counters a purchase draws from.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Storage`] if a counter cannot be written.
    pub async fn ensure_units(&self, units: &[InventoryUnit]) -> Result<(), CheckoutError> {
        for unit in units {
            self.ledger.ensure_unit(unit).await?;
        }
        Ok(())
    }

    /// Hold every line for `reservation_id`, or nothing.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::CapacityExceeded`] when a line does not fit
    /// - [`CheckoutError::NotFound`] when a counter is missing
    /// - [`CheckoutError::Storage`] on storage failure
    pub async fn reserve(
        &self,
        reservation_id: ReservationId,
        lines: &[UnitRequest],
    ) -> Result<(), CheckoutError> {
        match self.ledger.check_and_reserve(reservation_id, lines).await? {
            ReserveOutcome::Reserved => {
                metrics::record_inventory("reserved");
                tracing::debug!(%reservation_id, lines = lines.len(), "Inventory reserved");
                Ok(())
            }
            ReserveOutcome::InsufficientCapacity {
                unit_id,
                requested,
                remaining,
            } => {
                metrics::record_inventory("insufficient_capacity");
                tracing::info!(
                    %reservation_id,
                    %unit_id,
                    requested,
                    remaining,
                    "Insufficient capacity"
                );
                Err(CheckoutError::CapacityExceeded {
                    unit_id,
                    requested,
                    remaining,
                })
            }
            ReserveOutcome::UnknownUnit(unit_id) => {
                metrics::record_inventory("unknown_unit");
                Err(CheckoutError::not_found("Inventory unit", unit_id))
            }
        }
    }

    /// Return the reservation's holds to the pool. Safe to repeat. A paid
    /// reservation keeps its holds and reports zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the release could not be written; the holds
    /// stay in place and a later call can retry.
    pub async fn release(&self, reservation_id: ReservationId) -> Result<u32, StoreError> {
        match self.ledger.release_reservation(reservation_id).await? {
            ReleaseOutcome::Released { units } => {
                metrics::record_inventory("released");
                tracing::info!(%reservation_id, units, "Inventory released");
                Ok(units)
            }
            ReleaseOutcome::NothingHeld => {
                tracing::debug!(%reservation_id, "Nothing held, release skipped");
                Ok(0)
            }
            ReleaseOutcome::Paid => {
                metrics::record_inventory("release_refused");
                tracing::warn!(%reservation_id, "Reservation is paid, holds kept");
                Ok(0)
            }
        }
    }
}

impl std::fmt::Debug for InventoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryService").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use marketplace_core::types::ResourceId;
    use marketplace_testing::InMemoryStore;

    #[tokio::test]
    async fn test_reserve_maps_outcomes() {
        let store = InMemoryStore::new();
        let service = InventoryService::new(Arc::new(store.clone()));
        let unit = InventoryUnit::new(ResourceId::new(), None, 2);
        service.ensure_units(std::slice::from_ref(&unit)).await.unwrap();

        let first = ReservationId::new();
        let line = [UnitRequest {
            unit_id: unit.id,
            quantity: 2,
        }];
        service.reserve(first, &line).await.unwrap();

        let err = service.reserve(ReservationId::new(), &line).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::CapacityExceeded {
                requested: 2,
                remaining: 0,
                ..
            }
        ));

        assert_eq!(service.release(first).await.unwrap(), 2);
        assert_eq!(service.release(first).await.unwrap(), 0);
        assert_eq!(store.committed(unit.id), Some(0));
    }

    #[tokio::test]
    async fn test_missing_unit_is_not_found() {
        let service = InventoryService::new(Arc::new(InMemoryStore::new()));
        let line = [UnitRequest {
            unit_id: InventoryUnit::new(ResourceId::new(), None, 1).id,
            quantity: 1,
        }];

        let err = service.reserve(ReservationId::new(), &line).await.unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound { .. }));
    }
}
