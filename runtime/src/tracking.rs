//! Read-only projections: tracking views, truck manifests and nearby search.
//!
//! Nothing in here touches the [`EventHub`](crate::hub::EventHub).

use chrono::{DateTime, Utc};
use fleetops_core::cargo::{Cargo, CargoStatus};
use fleetops_core::geo::within_radius;
use fleetops_core::ledger::CargoEvent;
use fleetops_core::lifecycle::LifecycleError;
use fleetops_core::store::FleetStore;
use fleetops_core::truck::TruckLocation;
use fleetops_core::{CargoId, TenantId, TruckId};
use serde::Serialize;
use std::sync::Arc;

/// Default number of ledger entries in a tracking view.
pub const DEFAULT_RECENT_EVENTS: usize = 10;

/// Default search radius for nearby cargo, in kilometers.
pub const DEFAULT_NEARBY_RADIUS_KM: f64 = 50.0;

/// Tracking view configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    /// Ledger entries included in a view
    pub recent_events: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            recent_events: DEFAULT_RECENT_EVENTS,
        }
    }
}

/// Read-optimized snapshot of one shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    /// The cargo itself
    pub cargo: Cargo,
    /// Current status
    pub current_status: CargoStatus,
    /// Coarse completion percentage derived from the status
    pub progress: u8,
    /// Stored delivery estimate, passed through unchanged
    pub estimated_eta: Option<DateTime<Utc>>,
    /// Last real-time position report
    pub last_update: Option<DateTime<Utc>>,
    /// Most recent ledger entries, newest first
    pub recent_events: Vec<CargoEvent>,
    /// Last known position of the assigned truck
    pub truck_location: Option<TruckLocation>,
}

/// Query service behind tracking pages and dispatch screens.
#[derive(Clone)]
pub struct TrackingService {
    store: Arc<dyn FleetStore>,
    config: TrackingConfig,
}

impl std::fmt::Debug for TrackingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TrackingService {
    /// Create a query service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn FleetStore>, config: TrackingConfig) -> Self {
        Self { store, config }
    }

    /// Assemble the tracking view for a tracking code.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::TrackingCodeNotFound`] if no live cargo in the tenant
    /// carries the code, or [`LifecycleError::Persistence`] from the store.
    pub async fn track(
        &self,
        tenant_id: TenantId,
        tracking_code: &str,
    ) -> Result<TrackingView, LifecycleError> {
        let cargo = self
            .store
            .cargo_by_tracking_code(tenant_id, tracking_code)
            .await?
            .ok_or_else(|| LifecycleError::TrackingCodeNotFound(tracking_code.to_string()))?;

        let mut recent_events = self.store.ledger(tenant_id, cargo.id).await?;
        recent_events.truncate(self.config.recent_events);

        let truck_location = match cargo.truck_id {
            Some(truck_id) => self
                .store
                .truck(tenant_id, truck_id)
                .await?
                .and_then(|truck| truck.last_location),
            None => None,
        };

        Ok(TrackingView {
            current_status: cargo.status,
            progress: cargo.progress(),
            estimated_eta: cargo.estimated_delivery,
            last_update: cargo.last_updated,
            recent_events,
            truck_location,
            cargo,
        })
    }

    /// Load one live cargo.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::CargoNotFound`] outside the tenant, or
    /// [`LifecycleError::Persistence`] from the store.
    pub async fn get(&self, tenant_id: TenantId, cargo_id: CargoId) -> Result<Cargo, LifecycleError> {
        self.store
            .cargo(tenant_id, cargo_id)
            .await?
            .ok_or(LifecycleError::CargoNotFound(cargo_id))
    }

    /// Live cargo currently referencing a truck.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::TruckNotFound`] outside the tenant, or
    /// [`LifecycleError::Persistence`] from the store.
    pub async fn list_by_truck(
        &self,
        tenant_id: TenantId,
        truck_id: TruckId,
    ) -> Result<Vec<Cargo>, LifecycleError> {
        if self.store.truck(tenant_id, truck_id).await?.is_none() {
            return Err(LifecycleError::TruckNotFound(truck_id));
        }
        Ok(self.store.cargo_for_truck(tenant_id, truck_id).await?)
    }

    /// `pending` cargo without a truck, highest priority first, then oldest.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Persistence`] from the store.
    pub async fn list_unassigned(&self, tenant_id: TenantId) -> Result<Vec<Cargo>, LifecycleError> {
        Ok(self.store.unassigned_cargo(tenant_id).await?)
    }

    /// Unassigned cargo whose origin lies within `radius_km` of the truck's
    /// last known position. Empty when the truck has never reported one;
    /// cargo without origin coordinates never matches.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for a negative or non-finite radius
    /// - [`LifecycleError::TruckNotFound`] outside the tenant
    /// - [`LifecycleError::Persistence`] from the store
    pub async fn nearby_for_truck(
        &self,
        tenant_id: TenantId,
        truck_id: TruckId,
        radius_km: f64,
    ) -> Result<Vec<Cargo>, LifecycleError> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(LifecycleError::Validation(format!(
                "radius must be a non-negative number of kilometers, got {radius_km}"
            )));
        }

        let truck = self
            .store
            .truck(tenant_id, truck_id)
            .await?
            .ok_or(LifecycleError::TruckNotFound(truck_id))?;

        let Some(position) = truck.last_location.map(|l| l.coordinates()) else {
            return Ok(Vec::new());
        };

        let candidates = self.store.unassigned_cargo(tenant_id).await?;
        Ok(candidates
            .into_iter()
            .filter(|cargo| {
                cargo
                    .origin
                    .coordinates
                    .is_some_and(|origin| within_radius(&position, &origin, radius_km))
            })
            .collect())
    }
}
