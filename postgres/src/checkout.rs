//! Payments, reservations, line items and tickets.

use crate::{PostgresStore, db_error, from_db_count, to_db_count};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use marketplace_core::StoreError;
use marketplace_core::ports::{
    CaptureCommand, CheckoutStore, FailureCommand, RefundCommand, Transition,
};
use marketplace_core::types::{
    Currency, InventoryUnitId, LineItem, Money, Payment, PaymentId, PaymentProvider,
    PaymentStatus, Reservation, ReservationId, ReservationKind, ReservationRef,
    ReservationStatus, ResourceId, Ticket, TicketId, UserId, VendorId,
};
use sqlx::PgConnection;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, amount_minor, currency, provider, provider_order_id, \
     provider_payment_id, status, user_id, reservation_kind, reservation_id, \
     created_at, updated_at";

type PaymentRow = (
    Uuid,
    i64,
    String,
    String,
    String,
    Option<String>,
    String,
    Uuid,
    String,
    Uuid,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ReservationRow = (
    Uuid,
    String,
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    String,
    Option<NaiveDate>,
    i64,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn parse_currency(code: &str) -> Result<Currency, StoreError> {
    Currency::parse(code).map_err(StoreError::Corrupt)
}

fn payment_from_row(row: PaymentRow) -> Result<Payment, StoreError> {
    let (
        id,
        amount_minor,
        currency_code,
        provider,
        provider_order_id,
        provider_payment_id,
        status,
        user_id,
        reservation_kind,
        reservation_id,
        created_at,
        updated_at,
    ) = row;

    Ok(Payment {
        id: PaymentId::from_uuid(id),
        amount: Money::from_minor(amount_minor, parse_currency(&currency_code)?),
        provider: PaymentProvider::parse(&provider)?,
        provider_order_id,
        provider_payment_id,
        status: PaymentStatus::parse(&status)?,
        user_id: UserId::from_uuid(user_id),
        reservation: ReservationRef {
            kind: ReservationKind::parse(&reservation_kind)?,
            id: ReservationId::from_uuid(reservation_id),
        },
        created_at,
        updated_at,
    })
}

/// Which provider reference a transition locates its payment by.
#[derive(Clone, Copy)]
enum Locator<'a> {
    Order(&'a str),
    ProviderPayment(&'a str),
}

impl<'a> Locator<'a> {
    const fn column(self) -> &'static str {
        match self {
            Self::Order(_) => "provider_order_id",
            Self::ProviderPayment(_) => "provider_payment_id",
        }
    }

    const fn reference(self) -> &'a str {
        match self {
            Self::Order(reference) | Self::ProviderPayment(reference) => reference,
        }
    }
}

async fn load_payment(
    conn: &mut PgConnection,
    locator: Locator<'_>,
) -> Result<Option<Payment>, StoreError> {
    let row: Option<PaymentRow> = sqlx::query_as(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {} = $1",
        locator.column()
    ))
    .bind(locator.reference())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to load payment"))?;

    row.map(payment_from_row).transpose()
}

async fn load_line_items(
    conn: &mut PgConnection,
    reservation_id: ReservationId,
    currency: &Currency,
) -> Result<Vec<LineItem>, StoreError> {
    let rows: Vec<(Uuid, Uuid, i32, i64)> = sqlx::query_as(
        "SELECT unit_id, resource_id, quantity, unit_price_minor
         FROM reservation_line_items
         WHERE reservation_id = $1
         ORDER BY position",
    )
    .bind(reservation_id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to load line items"))?;

    rows.into_iter()
        .map(|(unit_id, resource_id, quantity, unit_price_minor)| {
            Ok(LineItem {
                unit_id: InventoryUnitId::from_uuid(unit_id),
                resource_id: ResourceId::from_uuid(resource_id),
                quantity: from_db_count(quantity, "quantity")?,
                unit_price: Money::from_minor(unit_price_minor, currency.clone()),
            })
        })
        .collect()
}

async fn load_reservation(
    conn: &mut PgConnection,
    reservation_id: ReservationId,
) -> Result<Option<Reservation>, StoreError> {
    let row: Option<ReservationRow> = sqlx::query_as(
        "SELECT id, kind, user_id, vendor_id, parent_id, payment_id, status, service_date,
                total_minor, currency, created_at, updated_at
         FROM reservations
         WHERE id = $1",
    )
    .bind(reservation_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("Failed to load reservation"))?;

    let Some((
        id,
        kind,
        user_id,
        vendor_id,
        parent_id,
        payment_id,
        status,
        service_date,
        total_minor,
        currency_code,
        created_at,
        updated_at,
    )) = row
    else {
        return Ok(None);
    };

    let currency = parse_currency(&currency_code)?;
    let line_items = load_line_items(conn, reservation_id, &currency).await?;

    Ok(Some(Reservation {
        id: ReservationId::from_uuid(id),
        kind: ReservationKind::parse(&kind)?,
        user_id: UserId::from_uuid(user_id),
        vendor_id: VendorId::from_uuid(vendor_id),
        parent_id: ResourceId::from_uuid(parent_id),
        payment_id: PaymentId::from_uuid(payment_id),
        status: ReservationStatus::parse(&status)?,
        service_date,
        total: Money::from_minor(total_minor, currency),
        line_items,
        created_at,
        updated_at,
    }))
}

/// One ticket per purchased unit, inserted in a single statement.
async fn issue_tickets(
    conn: &mut PgConnection,
    reservation: &Reservation,
) -> Result<u32, StoreError> {
    let mut ids = Vec::new();
    let mut units = Vec::new();
    let mut codes = Vec::new();
    for item in &reservation.line_items {
        for _ in 0..item.quantity {
            let id = TicketId::new();
            ids.push(*id.as_uuid());
            units.push(*item.unit_id.as_uuid());
            codes.push(id.as_uuid().simple().to_string());
        }
    }

    if ids.is_empty() {
        return Ok(0);
    }

    let issued = sqlx::query(
        "INSERT INTO tickets (id, reservation_id, unit_id, code)
         SELECT t.id, $1, t.unit_id, t.code
         FROM UNNEST($2::uuid[], $3::uuid[], $4::text[]) AS t(id, unit_id, code)",
    )
    .bind(reservation.id.as_uuid())
    .bind(&ids)
    .bind(&units)
    .bind(&codes)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to issue tickets"))?
    .rows_affected();

    u32::try_from(issued).map_err(|_| StoreError::Corrupt(format!("issued {issued} tickets")))
}

/// Void every still-valid ticket of a reservation.
async fn void_tickets(
    conn: &mut PgConnection,
    reservation_id: ReservationId,
    at: DateTime<Utc>,
) -> Result<u32, StoreError> {
    let voided = sqlx::query(
        "UPDATE tickets SET voided_at = $2
         WHERE reservation_id = $1 AND voided_at IS NULL",
    )
    .bind(reservation_id.as_uuid())
    .bind(at)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to void tickets"))?
    .rows_affected();

    u32::try_from(voided).map_err(|_| StoreError::Corrupt(format!("voided {voided} tickets")))
}

impl PostgresStore {
    /// Move a payment from `from` to `to` and its reservation along with it, in
    /// one transaction. Nothing changes unless the payment is currently `from`.
    async fn transition(
        &self,
        locator: Locator<'_>,
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

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        let updated: Option<PaymentRow> = sqlx::query_as(&format!(
            "UPDATE payments
             SET status = $1,
                 provider_payment_id = COALESCE($2, provider_payment_id),
                 updated_at = $3
             WHERE {} = $4 AND status = $5
             RETURNING {PAYMENT_COLUMNS}",
            locator.column()
        ))
        .bind(to.as_str())
        .bind(provider_payment_id)
        .bind(at)
        .bind(locator.reference())
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to update payment"))?;

        let Some(row) = updated else {
            let current = load_payment(&mut *tx, locator).await?;
            let _ = tx.rollback().await;
            return Ok(match current {
                Some(payment) => Transition::Unchanged { payment },
                None => Transition::UnknownPayment,
            });
        };
        let payment = payment_from_row(row)?;

        sqlx::query(
            "UPDATE reservations SET status = $2, updated_at = $3
             WHERE id = $1 AND status = $4",
        )
        .bind(payment.reservation.id.as_uuid())
        .bind(to.reservation_status().as_str())
        .bind(at)
        .bind(from.reservation_status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update reservation"))?;

        let reservation = load_reservation(&mut *tx, payment.reservation.id)
            .await?
            .ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "payment {} has no reservation {}",
                    payment.id, payment.reservation.id
                ))
            })?;

        let is_ticket_order = reservation.kind == ReservationKind::TicketOrder;
        let tickets_issued = if to == PaymentStatus::Captured && is_ticket_order {
            issue_tickets(&mut *tx, &reservation).await?
        } else {
            0
        };
        let tickets_voided = if to == PaymentStatus::Refunded && is_ticket_order {
            void_tickets(&mut *tx, reservation.id, at).await?
        } else {
            0
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit payment transition"))?;

        Ok(Transition::Applied {
            payment,
            reservation,
            tickets_issued,
            tickets_voided,
        })
    }
}

#[async_trait]
impl CheckoutStore for PostgresStore {
    async fn record_checkout(
        &self,
        payment: &Payment,
        reservation: &Reservation,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(payment.id.as_uuid())
        .bind(payment.amount.minor)
        .bind(payment.amount.currency.as_str())
        .bind(payment.provider.as_str())
        .bind(&payment.provider_order_id)
        .bind(payment.provider_payment_id.as_deref())
        .bind(payment.status.as_str())
        .bind(payment.user_id.as_uuid())
        .bind(payment.reservation.kind.as_str())
        .bind(payment.reservation.id.as_uuid())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert payment"))?;

        sqlx::query(
            "INSERT INTO reservations
                 (id, kind, user_id, vendor_id, parent_id, payment_id, status, service_date,
                  total_minor, currency, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.kind.as_str())
        .bind(reservation.user_id.as_uuid())
        .bind(reservation.vendor_id.as_uuid())
        .bind(reservation.parent_id.as_uuid())
        .bind(reservation.payment_id.as_uuid())
        .bind(reservation.status.as_str())
        .bind(reservation.service_date)
        .bind(reservation.total.minor)
        .bind(reservation.total.currency.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert reservation"))?;

        for (position, item) in (0_i32..).zip(&reservation.line_items) {
            sqlx::query(
                "INSERT INTO reservation_line_items
                     (reservation_id, position, unit_id, resource_id, quantity, unit_price_minor)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(reservation.id.as_uuid())
            .bind(position)
            .bind(item.unit_id.as_uuid())
            .bind(item.resource_id.as_uuid())
            .bind(to_db_count(item.quantity, "quantity")?)
            .bind(item.unit_price.minor)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert line item"))?;
        }

        if reservation.status == ReservationStatus::Confirmed
            && reservation.kind == ReservationKind::TicketOrder
        {
            issue_tickets(&mut *tx, reservation).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit checkout"))?;

        Ok(())
    }

    async fn payment(&self, payment_id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let row: Option<PaymentRow> =
            sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
                .bind(payment_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(db_error("Failed to load payment"))?;

        row.map(payment_from_row).transpose()
    }

    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, StoreError> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        load_reservation(&mut *conn, reservation_id).await
    }

    async fn capture_payment(&self, command: &CaptureCommand) -> Result<Transition, StoreError> {
        self.transition(
            Locator::Order(&command.provider_order_id),
            PaymentStatus::Pending,
            PaymentStatus::Captured,
            Some(&command.provider_payment_id),
            command.at,
        )
        .await
    }

    async fn fail_payment(&self, command: &FailureCommand) -> Result<Transition, StoreError> {
        self.transition(
            Locator::Order(&command.provider_order_id),
            PaymentStatus::Pending,
            PaymentStatus::Failed,
            None,
            command.at,
        )
        .await
    }

    async fn refund_payment(&self, command: &RefundCommand) -> Result<Transition, StoreError> {
        self.transition(
            Locator::ProviderPayment(&command.provider_payment_id),
            PaymentStatus::Captured,
            PaymentStatus::Refunded,
            None,
            command.at,
        )
        .await
    }

    async fn tickets(&self, reservation_id: ReservationId) -> Result<Vec<Ticket>, StoreError> {
        let rows: Vec<(Uuid, Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT id, reservation_id, unit_id, code
             FROM tickets
             WHERE reservation_id = $1 AND voided_at IS NULL
             ORDER BY issued_at, code",
        )
        .bind(reservation_id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to load tickets"))?;

        Ok(rows
            .into_iter()
            .map(|(id, reservation_id, unit_id, code)| Ticket {
                id: TicketId::from_uuid(id),
                reservation_id: ReservationId::from_uuid(reservation_id),
                unit_id: InventoryUnitId::from_uuid(unit_id),
                code,
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map_err(db_error("Database ping failed"))?;
        Ok(())
    }
}
