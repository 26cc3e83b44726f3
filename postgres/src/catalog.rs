//! Read-only catalog lookup over `catalog_items`.

use crate::{PostgresStore, db_error, from_db_count};
use async_trait::async_trait;
use chrono::{DateTime, Utc, Weekday};
use marketplace_core::StoreError;
use marketplace_core::ports::{CatalogItem, CatalogLookup, Pricing};
use marketplace_core::types::{Currency, Money, ReservationKind, ResourceId, VendorId};
use uuid::Uuid;

type CatalogRow = (
    Uuid,
    String,
    Uuid,
    Uuid,
    String,
    String,
    i64,
    String,
    i32,
    bool,
    Option<DateTime<Utc>>,
    Option<i16>,
);

fn weekday_from_db(value: i16) -> Result<Weekday, StoreError> {
    u8::try_from(value)
        .ok()
        .and_then(|day| Weekday::try_from(day).ok())
        .ok_or_else(|| StoreError::Corrupt(format!("invalid weekday: {value}")))
}

fn item_from_row(row: CatalogRow) -> Result<CatalogItem, StoreError> {
    let (
        resource_id,
        kind,
        vendor_id,
        parent_id,
        name,
        pricing,
        price_minor,
        currency,
        capacity,
        published,
        starts_at,
        weekday,
    ) = row;

    let currency = Currency::parse(&currency).map_err(StoreError::Corrupt)?;
    let price = Money::from_minor(price_minor, currency);
    let pricing = match pricing.as_str() {
        "per_unit" => Pricing::PerUnit(price),
        "flat" => Pricing::Flat(price),
        other => return Err(StoreError::Corrupt(format!("unknown pricing: {other}"))),
    };

    Ok(CatalogItem {
        resource_id: ResourceId::from_uuid(resource_id),
        kind: ReservationKind::parse(&kind)?,
        vendor_id: VendorId::from_uuid(vendor_id),
        parent_id: ResourceId::from_uuid(parent_id),
        name,
        pricing,
        capacity: from_db_count(capacity, "capacity")?,
        published,
        starts_at,
        weekday: weekday.map(weekday_from_db).transpose()?,
    })
}

#[async_trait]
impl CatalogLookup for PostgresStore {
    async fn resolve(&self, resource_id: ResourceId) -> Result<Option<CatalogItem>, StoreError> {
        let row: Option<CatalogRow> = sqlx::query_as(
            "SELECT resource_id, kind, vendor_id, parent_id, name, pricing, price_minor, currency,
                    capacity, published, starts_at, weekday
             FROM catalog_items
             WHERE resource_id = $1",
        )
        .bind(resource_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to resolve catalog item"))?;

        row.map(item_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_is_counted_from_monday() {
        assert_eq!(weekday_from_db(0), Ok(Weekday::Mon));
        assert_eq!(weekday_from_db(6), Ok(Weekday::Sun));
        assert!(weekday_from_db(7).is_err());
        assert!(weekday_from_db(-1).is_err());
    }
}
