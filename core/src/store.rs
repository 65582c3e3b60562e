//! Persistence collaborator for cargo, trucks and the cargo ledger.
//!
//! Tenant isolation is structural: every read takes a [`TenantId`], and every
//! write happens through a [`FleetTransaction`] that is bound to one tenant when
//! it is opened. There is no way to address a row by its global id alone.
//!
//! # Implementations
//!
//! - `PostgresFleetStore` (in `fleetops-postgres`): row locks via `SELECT ... FOR UPDATE`
//! - `InMemoryFleetStore` (in `fleetops-testing`): a single mutex, for deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the runtime can
//! hold an `Arc<dyn FleetStore>`.

use crate::cargo::Cargo;
use crate::ids::{CargoId, TenantId, TruckId};
use crate::ledger::{CargoEvent, NewCargoEvent};
use crate::truck::Truck;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors raised by the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection, query or constraint failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The cargo row was written but its ledger entries were not.
    ///
    /// Only raised by stores that cannot make the two writes atomic.
    #[error("Partial commit for cargo {cargo_id}: {reason}")]
    PartialCommit {
        /// Cargo whose ledger is now behind its row
        cargo_id: CargoId,
        /// What failed
        reason: String,
    },
}

/// Read side of the fleet store plus the entry point for transactions.
pub trait FleetStore: Send + Sync {
    /// Check that the backing storage is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if it is not.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Open a transaction scoped to `tenant_id`.
    ///
    /// Dropping the transaction without calling
    /// [`commit`](FleetTransaction::commit) discards its writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no transaction can be started.
    fn begin(&self, tenant_id: TenantId) -> StoreFuture<'_, Box<dyn FleetTransaction>>;

    /// Load a live (not deleted) cargo.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn cargo(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>>;

    /// Load a live cargo by its tracking code.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn cargo_by_tracking_code<'a>(
        &'a self,
        tenant_id: TenantId,
        tracking_code: &'a str,
    ) -> StoreFuture<'a, Option<Cargo>>;

    /// Load a truck.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>>;

    /// Live cargo referencing `truck_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn cargo_for_truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Vec<Cargo>>;

    /// Live `pending` cargo with no truck, highest priority first, then oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn unassigned_cargo(&self, tenant_id: TenantId) -> StoreFuture<'_, Vec<Cargo>>;

    /// Ledger entries of a cargo, newest first (ties broken by id, descending).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn ledger(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Vec<CargoEvent>>;
}

/// A unit of work bound to one tenant.
///
/// Rows returned by the `lock_*` methods stay locked against other
/// transactions until this one commits or is dropped.
pub trait FleetTransaction: Send {
    /// Tenant this transaction is bound to.
    fn tenant_id(&self) -> TenantId;

    /// Allocate the next per-tenant tracking sequence number, starting at 1.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the counter cannot be advanced.
    fn next_tracking_sequence(&mut self) -> StoreFuture<'_, u64>;

    /// Insert a new cargo and return it with its allocated id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the insert fails.
    fn insert_cargo(&mut self, cargo: Cargo) -> StoreFuture<'_, Cargo>;

    /// Load and lock a live cargo.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn lock_cargo(&mut self, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>>;

    /// Load and lock a truck.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn lock_truck(&mut self, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>>;

    /// Number of live cargo on `truck_id`, not counting `excluding`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the query fails.
    fn count_cargo_on_truck(
        &mut self,
        truck_id: TruckId,
        excluding: CargoId,
    ) -> StoreFuture<'_, usize>;

    /// Overwrite a cargo row.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the update fails.
    fn update_cargo<'a>(&'a mut self, cargo: &'a Cargo) -> StoreFuture<'a, ()>;

    /// Overwrite a truck's status and last known location.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the update fails.
    fn update_truck<'a>(&'a mut self, truck: &'a Truck) -> StoreFuture<'a, ()>;

    /// Mark a cargo deleted. Returns `false` if it was not live.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the update fails.
    fn soft_delete_cargo(&mut self, cargo_id: CargoId, at: DateTime<Utc>) -> StoreFuture<'_, bool>;

    /// Append a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the insert fails.
    fn append_event(
        &mut self,
        cargo_id: CargoId,
        event: NewCargoEvent,
    ) -> StoreFuture<'_, CargoEvent>;

    /// Make every write of this transaction visible.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PartialCommit`] if the cargo row was persisted
    /// but its ledger entries were lost, or another [`StoreError`] if nothing
    /// was committed.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}
