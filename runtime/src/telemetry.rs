//! Truck position reports.

use crate::hub::EventHub;
use fleetops_core::broadcast::{BroadcastMessage, MessageKind};
use fleetops_core::environment::Clock;
use fleetops_core::geo::Coordinates;
use fleetops_core::lifecycle::LifecycleError;
use fleetops_core::store::FleetStore;
use fleetops_core::truck::{Truck, TruckLocation};
use fleetops_core::{ActorContext, TruckId};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// One telemetry fix as reported by a driver's device.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryFix {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Ground speed in km/h
    #[serde(default)]
    pub speed: f64,
    /// Heading in degrees from north
    #[serde(default)]
    pub heading: f64,
}

/// Stores truck positions and broadcasts them as `location_update`.
#[derive(Clone)]
pub struct TruckTelemetry {
    store: Arc<dyn FleetStore>,
    hub: EventHub,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TruckTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TruckTelemetry").finish_non_exhaustive()
    }
}

impl TruckTelemetry {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn FleetStore>, hub: EventHub, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock }
    }

    /// Record a truck's position. An `offline` truck comes `online`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] for out-of-range coordinates
    /// - [`LifecycleError::TruckNotFound`] outside the tenant
    /// - [`LifecycleError::Persistence`] from the store
    pub async fn update_truck_location(
        &self,
        actor: &ActorContext,
        truck_id: TruckId,
        fix: TelemetryFix,
    ) -> Result<Truck, LifecycleError> {
        Coordinates::new(fix.latitude, fix.longitude)
            .validate()
            .map_err(LifecycleError::Validation)?;

        let mut tx = self.store.begin(actor.tenant_id).await?;
        let mut truck = tx
            .lock_truck(truck_id)
            .await?
            .ok_or(LifecycleError::TruckNotFound(truck_id))?;
        let now = self.clock.now();

        truck.record_location(TruckLocation {
            latitude: fix.latitude,
            longitude: fix.longitude,
            speed: fix.speed,
            heading: fix.heading,
            recorded_at: now,
        });
        tx.update_truck(&truck).await?;
        tx.commit().await?;

        tracing::debug!(
            tenant_id = %actor.tenant_id,
            truck_id = %truck_id,
            status = %truck.status,
            "Truck location updated"
        );

        self.hub.broadcast_to_tenant(
            actor.tenant_id,
            BroadcastMessage::new(
                MessageKind::LocationUpdate,
                json!({
                    "truck_id": truck_id,
                    "latitude": fix.latitude,
                    "longitude": fix.longitude,
                    "speed": fix.speed,
                    "heading": fix.heading,
                    "timestamp": now,
                }),
            ),
        );

        Ok(truck)
    }
}
