//! # Marketplace Testing
//!
//! Testing utilities for marketplace checkout.
//!
//! This crate provides:
//! - [`InMemoryStore`]: every storage port over one in-process state
//! - [`MockPaymentGateway`]: scripted order creation with failure injection
//! - [`RecordingNotifier`] and [`RecordingAuditLog`]: sinks that keep what they receive
//! - [`fixtures`]: catalog builders for the three verticals
//! - A deterministic [`FixedClock`]
//!
//! ## Example
//!
//! ```
//! use marketplace_testing::{InMemoryStore, fixtures, test_clock};
//! use marketplace_core::types::{Currency, ResourceId};
//!
//! let store = InMemoryStore::new();
//! let tier = fixtures::ticket_tier(ResourceId::new(), 100, 2_500, &Currency::inr());
//! store.add_catalog_item(tier);
//! let _clock = test_clock();
//! ```

use chrono::{DateTime, Utc};
use marketplace_core::environment::Clock;

pub mod fixtures;
pub mod gateway;
pub mod sinks;
pub mod store;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use marketplace_testing::mocks::FixedClock;
    /// use marketplace_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests: Wednesday 2025-01-01 00:00:00 UTC.
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is hardcoded.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use gateway::MockPaymentGateway;
pub use mocks::{FixedClock, test_clock};
pub use sinks::{RecordingAuditLog, RecordingNotifier};
pub use store::InMemoryStore;
