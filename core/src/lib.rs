//! # Fleetops Core
//!
//! Domain types and the pure business logic for tenant-scoped fleet operations.
//!
//! This crate holds everything that can be decided without I/O:
//!
//! - **Domain types**: trucks, cargo shipments, ledger entries, broadcast messages
//! - **`CargoReducer`**: the cargo lifecycle as a pure function
//!   `(snapshot, command, environment) → effects`
//! - **Geo helpers**: great-circle distance for proximity search
//! - **Storage traits**: the persistence collaborator the runtime drives
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Imperative shell (fleetops-runtime)     │  ← transactions, EventHub
//! │   1. begin tenant-scoped transaction     │
//! │   2. lock cargo (+ truck) rows           │
//! ├──────────────────────────────────────────┤
//! │  Functional core (this crate)            │
//! │   3. CargoReducer::reduce(snapshot, cmd) │  ← no I/O, deterministic
//! ├──────────────────────────────────────────┤
//! │   4. persist SaveCargo / SaveTruck /     │
//! │      AppendLedger effects, commit        │
//! │   5. publish Broadcast effects           │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fleetops_core::lifecycle::{CargoCommand, CargoReducer, CargoSnapshot, LifecycleEnv};
//! use fleetops_core::reducer::Reducer;
//!
//! let mut snapshot = CargoSnapshot::new(cargo, Some(truck), 0);
//! let effects = CargoReducer.reduce(
//!     &mut snapshot,
//!     CargoCommand::Assign { truck_id, actor },
//!     &LifecycleEnv::at(now),
//! )?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub mod broadcast;
pub mod cargo;
pub mod geo;
pub mod ids;
pub mod ledger;
pub mod lifecycle;
pub mod store;
pub mod truck;

pub use ids::{CargoEventId, CargoId, TenantId, TruckId, UserId};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → Effects`
///
/// They contain all business logic and are deterministic and testable.
/// Unlike a plain state update, a reducer may reject an action; a rejected
/// action must leave the state untouched.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    /// - `Effect`: Side effect descriptions returned to the caller
    /// - `Error`: Why an action was rejected
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// The effect descriptions this reducer produces
        type Effect;

        /// The rejection type
        type Error;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is invalid for the current
        /// state. The state is not modified in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Effect; 4]>, Self::Error>;
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use fleetops_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Verified caller identity attached to every inbound call.
///
/// Authentication happens upstream; this crate trusts the context as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Tenant the caller acts within
    pub tenant_id: TenantId,
    /// Acting user
    pub user_id: UserId,
    /// Role reported by the gateway (`admin`, `assignee`, `driver`, ...)
    pub role: String,
}

impl ActorContext {
    /// Create a new actor context.
    #[must_use]
    pub fn new(tenant_id: TenantId, user_id: UserId, role: impl Into<String>) -> Self {
        Self {
            tenant_id,
            user_id,
            role: role.into(),
        }
    }
}
