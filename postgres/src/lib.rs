//! `PostgreSQL` storage for marketplace checkout.
//!
//! [`PostgresStore`] implements every storage port of `marketplace-core` over one
//! connection pool:
//!
//! - [`InventoryLedger`](marketplace_core::ports::InventoryLedger): conditional
//!   `UPDATE ... WHERE committed + n <= capacity` per line, all lines in one transaction
//! - [`CheckoutStore`](marketplace_core::ports::CheckoutStore): payment + reservation
//!   transitions conditioned on the payment's current status
//! - [`WebhookEventStore`](marketplace_core::ports::WebhookEventStore): primary-key
//!   deduplication with `ON CONFLICT DO NOTHING`
//! - [`CatalogLookup`](marketplace_core::ports::CatalogLookup) and
//!   [`AuditLog`](marketplace_core::ports::AuditLog)
//!
//! Concurrency correctness comes from these statements alone; nothing here takes
//! an in-process lock.
//!
//! # Example
//!
//! ```no_run
//! use marketplace_postgres::{ConnectionSettings, PostgresStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ConnectionSettings::default();
//! let store = PostgresStore::connect("postgres://localhost/marketplace", &settings).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use marketplace_core::StoreError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

mod audit;
mod catalog;
mod checkout;
mod inventory;
mod webhooks;

/// Pool sizing and connect timeout.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long to wait for a connection
    pub connect_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// `PostgreSQL` implementation of the checkout storage ports.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection can be established.
    pub async fn connect(
        database_url: &str,
        settings: &ConnectionSettings,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self::from_pool(pool))
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

/// Map a sqlx error, turning unique violations into [`StoreError::Conflict`].
pub(crate) fn db_error(context: &str) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |e| {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(format!("{context}: {db_err}"));
            }
        }
        StoreError::Database(format!("{context}: {e}"))
    }
}

/// Counts are `u32` in the domain and `INTEGER` in the schema.
pub(crate) fn to_db_count(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("{what} out of range: {value}")))
}

pub(crate) fn from_db_count(value: i32, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {what}: {value}")))
}
