//! In-memory [`FleetStore`] for fast, deterministic tests.

use chrono::{DateTime, Utc};
use fleetops_core::cargo::{Cargo, CargoStatus};
use fleetops_core::ledger::{newest_first, CargoEvent, NewCargoEvent};
use fleetops_core::store::{FleetStore, FleetTransaction, StoreError, StoreFuture};
use fleetops_core::truck::Truck;
use fleetops_core::{CargoEventId, CargoId, TenantId, TruckId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    trucks: BTreeMap<TruckId, Truck>,
    cargo: BTreeMap<CargoId, Cargo>,
    deleted: HashMap<CargoId, DateTime<Utc>>,
    events: Vec<CargoEvent>,
    sequences: HashMap<TenantId, u64>,
    next_truck_id: i64,
    next_cargo_id: i64,
    next_event_id: i64,
}

impl State {
    fn live_cargo(&self, tenant_id: TenantId, cargo_id: CargoId) -> Option<&Cargo> {
        self.cargo
            .get(&cargo_id)
            .filter(|c| c.tenant_id == tenant_id && !self.deleted.contains_key(&c.id))
    }

    fn live_cargo_in(&self, tenant_id: TenantId) -> impl Iterator<Item = &Cargo> {
        self.cargo
            .values()
            .filter(move |c| c.tenant_id == tenant_id && !self.deleted.contains_key(&c.id))
    }

    fn truck(&self, tenant_id: TenantId, truck_id: TruckId) -> Option<&Truck> {
        self.trucks.get(&truck_id).filter(|t| t.tenant_id == tenant_id)
    }
}

/// In-memory fleet store.
///
/// One mutex guards everything. A transaction holds it from `begin` until it
/// is committed or dropped and works on a private copy, so an uncommitted
/// transaction leaves no trace.
///
/// [`fail_ledger_writes`](Self::fail_ledger_writes) makes subsequent commits
/// persist their cargo and truck writes but drop their ledger entries, and
/// report [`StoreError::PartialCommit`].
///
/// # Example
///
/// ```
/// use fleetops_core::store::FleetStore;
/// use fleetops_core::truck::TruckStatus;
/// use fleetops_testing::{fixtures, InMemoryFleetStore};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryFleetStore::new();
/// let truck = store
///     .add_truck(fixtures::truck(fixtures::TENANT, "01A123BC", TruckStatus::Offline))
///     .await;
///
/// let loaded = store.truck(fixtures::TENANT, truck.id).await.unwrap();
/// assert_eq!(loaded, Some(truck));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryFleetStore {
    state: Arc<Mutex<State>>,
    fail_ledger: Arc<AtomicBool>,
}

impl InMemoryFleetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a truck, allocating its id.
    pub async fn add_truck(&self, mut truck: Truck) -> Truck {
        let mut state = self.state.lock().await;
        state.next_truck_id += 1;
        truck.id = TruckId::new(state.next_truck_id);
        state.trucks.insert(truck.id, truck.clone());
        truck
    }

    /// Make commits drop their ledger entries (or stop doing so).
    pub fn fail_ledger_writes(&self, fail: bool) {
        self.fail_ledger.store(fail, Ordering::SeqCst);
    }

    /// Total ledger entries across all tenants.
    pub async fn ledger_len(&self) -> usize {
        self.state.lock().await.events.len()
    }
}

impl FleetStore for InMemoryFleetStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn begin(&self, tenant_id: TenantId) -> StoreFuture<'_, Box<dyn FleetTransaction>> {
        Box::pin(async move {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let working = guard.clone();
            let tx: Box<dyn FleetTransaction> = Box::new(InMemoryTransaction {
                tenant_id,
                guard,
                working,
                fail_ledger: self.fail_ledger.load(Ordering::SeqCst),
            });
            Ok(tx)
        })
    }

    fn cargo(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.live_cargo(tenant_id, cargo_id).cloned())
        })
    }

    fn cargo_by_tracking_code<'a>(
        &'a self,
        tenant_id: TenantId,
        tracking_code: &'a str,
    ) -> StoreFuture<'a, Option<Cargo>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .live_cargo_in(tenant_id)
                .find(|c| c.tracking_code == tracking_code)
                .cloned())
        })
    }

    fn truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.truck(tenant_id, truck_id).cloned())
        })
    }

    fn cargo_for_truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Vec<Cargo>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut cargo: Vec<Cargo> = state
                .live_cargo_in(tenant_id)
                .filter(|c| c.truck_id == Some(truck_id))
                .cloned()
                .collect();
            cargo.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(cargo)
        })
    }

    fn unassigned_cargo(&self, tenant_id: TenantId) -> StoreFuture<'_, Vec<Cargo>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut cargo: Vec<Cargo> = state
                .live_cargo_in(tenant_id)
                .filter(|c| c.status == CargoStatus::Pending && c.truck_id.is_none())
                .cloned()
                .collect();
            cargo.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
            Ok(cargo)
        })
    }

    fn ledger(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Vec<CargoEvent>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut events: Vec<CargoEvent> = state
                .events
                .iter()
                .filter(|e| e.tenant_id == tenant_id && e.cargo_id == cargo_id)
                .cloned()
                .collect();
            newest_first(&mut events);
            Ok(events)
        })
    }
}

struct InMemoryTransaction {
    tenant_id: TenantId,
    guard: OwnedMutexGuard<State>,
    working: State,
    fail_ledger: bool,
}

impl FleetTransaction for InMemoryTransaction {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn next_tracking_sequence(&mut self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let sequence = self.working.sequences.entry(self.tenant_id).or_insert(0);
            *sequence += 1;
            Ok(*sequence)
        })
    }

    fn insert_cargo(&mut self, mut cargo: Cargo) -> StoreFuture<'_, Cargo> {
        Box::pin(async move {
            if cargo.tenant_id != self.tenant_id {
                return Err(StoreError::Database("cargo tenant does not match transaction".into()));
            }
            if self.working.cargo.values().any(|c| c.tracking_code == cargo.tracking_code) {
                return Err(StoreError::Database(format!(
                    "duplicate tracking code {}",
                    cargo.tracking_code
                )));
            }
            self.working.next_cargo_id += 1;
            cargo.id = CargoId::new(self.working.next_cargo_id);
            self.working.cargo.insert(cargo.id, cargo.clone());
            Ok(cargo)
        })
    }

    fn lock_cargo(&mut self, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>> {
        Box::pin(async move { Ok(self.working.live_cargo(self.tenant_id, cargo_id).cloned()) })
    }

    fn lock_truck(&mut self, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>> {
        Box::pin(async move { Ok(self.working.truck(self.tenant_id, truck_id).cloned()) })
    }

    fn count_cargo_on_truck(
        &mut self,
        truck_id: TruckId,
        excluding: CargoId,
    ) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            Ok(self
                .working
                .live_cargo_in(self.tenant_id)
                .filter(|c| c.truck_id == Some(truck_id) && c.id != excluding)
                .count())
        })
    }

    fn update_cargo<'a>(&'a mut self, cargo: &'a Cargo) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.working.live_cargo(self.tenant_id, cargo.id).is_none() {
                return Err(StoreError::Database(format!("cargo {} is not live", cargo.id)));
            }
            self.working.cargo.insert(cargo.id, cargo.clone());
            Ok(())
        })
    }

    fn update_truck<'a>(&'a mut self, truck: &'a Truck) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match self.working.trucks.get_mut(&truck.id) {
                Some(stored) if stored.tenant_id == self.tenant_id => {
                    stored.status = truck.status;
                    stored.last_location = truck.last_location;
                    Ok(())
                }
                _ => Err(StoreError::Database(format!("truck {} not found", truck.id))),
            }
        })
    }

    fn soft_delete_cargo(&mut self, cargo_id: CargoId, at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            if self.working.live_cargo(self.tenant_id, cargo_id).is_none() {
                return Ok(false);
            }
            self.working.deleted.insert(cargo_id, at);
            Ok(true)
        })
    }

    fn append_event(
        &mut self,
        cargo_id: CargoId,
        event: NewCargoEvent,
    ) -> StoreFuture<'_, CargoEvent> {
        Box::pin(async move {
            if !self.working.cargo.get(&cargo_id).is_some_and(|c| c.tenant_id == self.tenant_id) {
                return Err(StoreError::Database(format!("cargo {cargo_id} not found")));
            }
            self.working.next_event_id += 1;
            let id = CargoEventId::new(self.working.next_event_id);
            let stored = event.into_event(id, cargo_id, self.tenant_id);
            self.working.events.push(stored.clone());
            Ok(stored)
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let Self {
                mut guard,
                mut working,
                fail_ledger,
                ..
            } = *self;

            let committed = guard.events.len();
            if fail_ledger && working.events.len() > committed {
                let lost = working.events.split_off(committed);
                working.next_event_id = guard.next_event_id;
                *guard = working;
                let cargo_id = lost.first().map_or(CargoId::new(0), |e| e.cargo_id);
                return Err(StoreError::PartialCommit {
                    cargo_id,
                    reason: format!("{} ledger entr(ies) were not written", lost.len()),
                });
            }

            *guard = working;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::fixtures::{self, OTHER_TENANT, TENANT};
    use fleetops_core::ledger::EventKind;
    use fleetops_core::truck::TruckStatus;
    use fleetops_core::UserId;

    fn cargo(tenant_id: TenantId, code: &str) -> Cargo {
        fixtures::draft("Crates").into_cargo(tenant_id, code.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn uncommitted_transaction_leaves_no_trace() {
        let store = InMemoryFleetStore::new();
        {
            let mut tx = store.begin(TENANT).await.unwrap();
            tx.insert_cargo(cargo(TENANT, "TRK1000001")).await.unwrap();
        }
        assert!(store.unassigned_cargo(TENANT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sequences_are_per_tenant() {
        let store = InMemoryFleetStore::new();
        let mut tx = store.begin(TENANT).await.unwrap();
        assert_eq!(tx.next_tracking_sequence().await.unwrap(), 1);
        assert_eq!(tx.next_tracking_sequence().await.unwrap(), 2);
        tx.commit().await.unwrap();

        let mut tx = store.begin(OTHER_TENANT).await.unwrap();
        assert_eq!(tx.next_tracking_sequence().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reads_are_tenant_scoped() {
        let store = InMemoryFleetStore::new();
        let truck = store
            .add_truck(fixtures::truck(TENANT, "01A123BC", TruckStatus::Online))
            .await;

        let mut tx = store.begin(TENANT).await.unwrap();
        let stored = tx.insert_cargo(cargo(TENANT, "TRK1000001")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.cargo(OTHER_TENANT, stored.id).await.unwrap().is_none());
        assert!(store.truck(OTHER_TENANT, truck.id).await.unwrap().is_none());
        assert!(store.cargo(TENANT, stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ledger_fault_keeps_row_but_drops_entries() {
        let store = InMemoryFleetStore::new();
        let mut tx = store.begin(TENANT).await.unwrap();
        let stored = tx.insert_cargo(cargo(TENANT, "TRK1000001")).await.unwrap();
        tx.append_event(
            stored.id,
            NewCargoEvent::new(EventKind::Created, "created", UserId::new(1), Utc::now()),
        )
        .await
        .unwrap();

        store.fail_ledger_writes(true);
        // the flag is sampled at begin, so this transaction still succeeds
        tx.commit().await.unwrap();

        let mut tx = store.begin(TENANT).await.unwrap();
        let mut row = tx.lock_cargo(stored.id).await.unwrap().unwrap();
        row.title = "Renamed".to_string();
        tx.update_cargo(&row).await.unwrap();
        tx.append_event(
            stored.id,
            NewCargoEvent::new(EventKind::StatusChange, "changed", UserId::new(1), Utc::now()),
        )
        .await
        .unwrap();
        let result = tx.commit().await;

        assert!(matches!(result, Err(StoreError::PartialCommit { cargo_id, .. }) if cargo_id == stored.id));
        assert_eq!(store.cargo(TENANT, stored.id).await.unwrap().unwrap().title, "Renamed");
        assert_eq!(store.ledger(TENANT, stored.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_cargo_disappears_from_reads_and_counts() {
        let store = InMemoryFleetStore::new();
        let truck = store
            .add_truck(fixtures::truck(TENANT, "01A123BC", TruckStatus::InUse))
            .await;

        let mut tx = store.begin(TENANT).await.unwrap();
        let mut c = cargo(TENANT, "TRK1000001");
        c.truck_id = Some(truck.id);
        let stored = tx.insert_cargo(c).await.unwrap();
        assert!(tx.soft_delete_cargo(stored.id, Utc::now()).await.unwrap());
        assert!(!tx.soft_delete_cargo(stored.id, Utc::now()).await.unwrap());
        assert_eq!(tx.count_cargo_on_truck(truck.id, CargoId::new(0)).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert!(store.cargo(TENANT, stored.id).await.unwrap().is_none());
        assert!(store.cargo_for_truck(TENANT, truck.id).await.unwrap().is_empty());
    }
}
