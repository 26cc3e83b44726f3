//! Inventory ledger over `inventory_units` and `inventory_holds`.

use crate::{PostgresStore, db_error, from_db_count, to_db_count};
use async_trait::async_trait;
use chrono::NaiveDate;
use marketplace_core::StoreError;
use marketplace_core::ports::{InventoryLedger, ReleaseOutcome, ReserveOutcome};
use marketplace_core::types::{
    InventoryUnit, InventoryUnitId, PaymentStatus, ReservationId, ResourceId, UnitRequest,
};
use std::collections::BTreeMap;
use uuid::Uuid;

type UnitRow = (Uuid, Uuid, Option<NaiveDate>, i32, i32);

fn unit_from_row(
    (id, resource_id, service_date, capacity, committed): UnitRow,
) -> Result<InventoryUnit, StoreError> {
    Ok(InventoryUnit {
        id: InventoryUnitId::from_uuid(id),
        resource_id: ResourceId::from_uuid(resource_id),
        service_date,
        capacity: from_db_count(capacity, "capacity")?,
        committed: from_db_count(committed, "committed")?,
    })
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    async fn ensure_unit(&self, unit: &InventoryUnit) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO inventory_units (id, resource_id, service_date, capacity, committed)
             VALUES ($1, $2, $3, $4, 0)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(unit.id.as_uuid())
        .bind(unit.resource_id.as_uuid())
        .bind(unit.service_date)
        .bind(to_db_count(unit.capacity, "capacity")?)
        .execute(self.pool())
        .await
        .map_err(db_error("Failed to ensure inventory unit"))?;

        Ok(())
    }

    async fn check_and_reserve(
        &self,
        reservation_id: ReservationId,
        lines: &[UnitRequest],
    ) -> Result<ReserveOutcome, StoreError> {
        // Sorted by unit id so concurrent multi-line reservations lock rows in the
        // same order.
        let mut requested: BTreeMap<InventoryUnitId, u32> = BTreeMap::new();
        for line in lines {
            let total = requested.entry(line.unit_id).or_default();
            *total = total.checked_add(line.quantity).ok_or_else(|| {
                StoreError::Conflict(format!("quantity overflow for unit {}", line.unit_id))
            })?;
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        for (&unit_id, &quantity) in &requested {
            let quantity_db = to_db_count(quantity, "quantity")?;

            let reserved: Option<(i32,)> = sqlx::query_as(
                "UPDATE inventory_units
                 SET committed = committed + $2
                 WHERE id = $1 AND committed + $2 <= capacity
                 RETURNING committed",
            )
            .bind(unit_id.as_uuid())
            .bind(quantity_db)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error("Failed to reserve inventory"))?;

            if reserved.is_none() {
                let current: Option<(i32, i32)> =
                    sqlx::query_as("SELECT capacity, committed FROM inventory_units WHERE id = $1")
                        .bind(unit_id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_error("Failed to read inventory unit"))?;

                // Undo the lines already taken; rollback errors leave the same result.
                let _ = tx.rollback().await;

                return Ok(match current {
                    None => ReserveOutcome::UnknownUnit(unit_id),
                    Some((capacity, committed)) => ReserveOutcome::InsufficientCapacity {
                        unit_id,
                        requested: quantity,
                        remaining: from_db_count(
                            capacity.saturating_sub(committed).max(0),
                            "remaining",
                        )?,
                    },
                });
            }

            sqlx::query(
                "INSERT INTO inventory_holds (reservation_id, unit_id, quantity)
                 VALUES ($1, $2, $3)",
            )
            .bind(reservation_id.as_uuid())
            .bind(unit_id.as_uuid())
            .bind(quantity_db)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to record inventory hold"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit reservation"))?;

        tracing::debug!(
            reservation_id = %reservation_id,
            lines = requested.len(),
            "Inventory reserved"
        );

        Ok(ReserveOutcome::Reserved)
    }

    async fn release_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<ReleaseOutcome, StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        // The payment row is locked first, the same row a capture updates, so a
        // capture and a release never interleave.
        let payment: Option<(String,)> =
            sqlx::query_as("SELECT status FROM payments WHERE reservation_id = $1 FOR UPDATE")
                .bind(reservation_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to lock payment"))?;
        let status = payment
            .map(|(status,)| PaymentStatus::parse(&status))
            .transpose()?;

        match status {
            Some(PaymentStatus::Captured) => {
                let _ = tx.rollback().await;
                return Ok(ReleaseOutcome::Paid);
            }
            Some(PaymentStatus::Pending) => {
                sqlx::query(
                    "UPDATE payments SET status = 'failed', updated_at = now()
                     WHERE reservation_id = $1 AND status = 'pending'",
                )
                .bind(reservation_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to expire payment"))?;

                sqlx::query(
                    "UPDATE reservations SET status = 'cancelled', updated_at = now()
                     WHERE id = $1 AND status = 'pending'",
                )
                .bind(reservation_id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to expire reservation"))?;

                tracing::info!(reservation_id = %reservation_id, "Pending reservation expired");
            }
            _ => {}
        }

        // Stamping released_at and restoring the counters happen in one
        // statement; a concurrent second release finds no open hold.
        let (released,): (i64,) = sqlx::query_as(
            "WITH released AS (
                 UPDATE inventory_holds
                 SET released_at = now()
                 WHERE reservation_id = $1 AND released_at IS NULL
                 RETURNING unit_id, quantity
             ), restored AS (
                 UPDATE inventory_units AS u
                 SET committed = u.committed - r.quantity
                 FROM released AS r
                 WHERE u.id = r.unit_id
                 RETURNING r.quantity
             )
             SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM restored",
        )
        .bind(reservation_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to release reservation"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit release"))?;

        if released == 0 {
            return Ok(ReleaseOutcome::NothingHeld);
        }

        let units = u32::try_from(released)
            .map_err(|_| StoreError::Corrupt(format!("released {released} units")))?;
        tracing::debug!(reservation_id = %reservation_id, units, "Inventory released");

        Ok(ReleaseOutcome::Released { units })
    }

    async fn unit(&self, unit_id: InventoryUnitId) -> Result<Option<InventoryUnit>, StoreError> {
        let row: Option<UnitRow> = sqlx::query_as(
            "SELECT id, resource_id, service_date, capacity, committed
             FROM inventory_units
             WHERE id = $1",
        )
        .bind(unit_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to load inventory unit"))?;

        row.map(unit_from_row).transpose()
    }
}
