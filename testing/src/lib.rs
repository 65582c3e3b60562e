//! # Fleetops Testing
//!
//! Testing utilities for fleetops.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time that only moves when told to
//! - [`InMemoryFleetStore`]: a `FleetStore` with ledger-fault injection
//! - [`fixtures`]: ready-made trucks and cargo drafts
//! - [`ReducerTest`]: Given-When-Then harness for the lifecycle reducer
//! - [`properties`]: proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use fleetops_testing::{fixtures, test_clock, InMemoryFleetStore};
//!
//! #[tokio::test]
//! async fn assigns() {
//!     let store = InMemoryFleetStore::new();
//!     let truck = store.add_truck(fixtures::truck(TENANT, "01A123BC", TruckStatus::Offline)).await;
//!     let lifecycle = CargoLifecycle::new(Arc::new(store.clone()), EventHub::default(), Arc::new(test_clock()));
//!     // ...
//! }
//! ```

use chrono::{DateTime, Utc};
use fleetops_core::environment::Clock;

pub mod fixtures;
mod store;

pub use reducer_test::{assertions, ReducerTest};
pub use store::InMemoryFleetStore;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until [`advance`](FixedClock::advance) is called,
    /// making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use fleetops_testing::mocks::FixedClock;
    /// use fleetops_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::seconds(5));
    /// assert_eq!(clock.now() - time1, Duration::seconds(5));
    /// ```
    #[derive(Debug)]
    pub struct FixedClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
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

/// Property-based testing utilities using proptest.
pub mod properties {
    use fleetops_core::cargo::CargoStatus;
    use fleetops_core::geo::Coordinates;
    use proptest::prelude::*;

    /// Any valid coordinate pair.
    pub fn coordinates() -> impl Strategy<Value = Coordinates> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| Coordinates::new(lat, lon))
    }

    /// Any cargo status.
    pub fn cargo_status() -> impl Strategy<Value = CargoStatus> {
        prop_oneof![
            Just(CargoStatus::Pending),
            Just(CargoStatus::Assigned),
            Just(CargoStatus::InTransit),
            Just(CargoStatus::Delivered),
            Just(CargoStatus::Cancelled),
        ]
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
