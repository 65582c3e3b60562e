//! Read side of the cargo ledger.
//!
//! Entries are only ever appended by [`CargoLifecycle`](crate::lifecycle::CargoLifecycle),
//! inside the same transaction that changes the cargo row.

use fleetops_core::ledger::{route_events, CargoEvent};
use fleetops_core::lifecycle::LifecycleError;
use fleetops_core::store::FleetStore;
use fleetops_core::{CargoId, TenantId};
use std::sync::Arc;

/// Tenant-scoped history queries over the append-only ledger.
#[derive(Clone)]
pub struct CargoLedger {
    store: Arc<dyn FleetStore>,
}

impl CargoLedger {
    /// Create a ledger reader over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn FleetStore>) -> Self {
        Self { store }
    }

    /// Every entry of a cargo, newest first.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::CargoNotFound`] if the cargo is not live in the
    /// tenant, or [`LifecycleError::Persistence`] from the store.
    pub async fn history(
        &self,
        tenant_id: TenantId,
        cargo_id: CargoId,
    ) -> Result<Vec<CargoEvent>, LifecycleError> {
        if self.store.cargo(tenant_id, cargo_id).await?.is_none() {
            return Err(LifecycleError::CargoNotFound(cargo_id));
        }
        Ok(self.store.ledger(tenant_id, cargo_id).await?)
    }

    /// Entries carrying coordinates, newest first: the cargo's breadcrumb trail.
    ///
    /// # Errors
    ///
    /// Same as [`history`](Self::history).
    pub async fn route(
        &self,
        tenant_id: TenantId,
        cargo_id: CargoId,
    ) -> Result<Vec<CargoEvent>, LifecycleError> {
        let history = self.history(tenant_id, cargo_id).await?;
        Ok(route_events(&history))
    }
}

impl std::fmt::Debug for CargoLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CargoLedger").finish_non_exhaustive()
    }
}
