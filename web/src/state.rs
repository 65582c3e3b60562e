//! Application state shared by all handlers.

use fleetops_core::environment::Clock;
use fleetops_core::store::FleetStore;
use fleetops_runtime::{
    CargoLedger, CargoLifecycle, EventHub, TrackingConfig, TrackingService, TruckTelemetry,
};
use std::fmt;
use std::sync::Arc;

/// Services wired over one store, hub and clock.
///
/// Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Backing store, used directly by readiness checks
    pub store: Arc<dyn FleetStore>,
    /// Tenant-scoped fan-out to websocket observers
    pub hub: EventHub,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Cargo mutations
    pub lifecycle: CargoLifecycle,
    /// Ledger reads
    pub ledger: CargoLedger,
    /// Cargo reads and tracking views
    pub tracking: TrackingService,
    /// Truck positions
    pub telemetry: TruckTelemetry,
}

impl AppState {
    /// Wire the services over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn FleetStore>,
        hub: EventHub,
        clock: Arc<dyn Clock>,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            lifecycle: CargoLifecycle::new(Arc::clone(&store), hub.clone(), Arc::clone(&clock)),
            ledger: CargoLedger::new(Arc::clone(&store)),
            tracking: TrackingService::new(Arc::clone(&store), tracking),
            telemetry: TruckTelemetry::new(Arc::clone(&store), hub.clone(), Arc::clone(&clock)),
            store,
            hub,
            clock,
        }
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}
