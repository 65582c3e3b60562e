//! Truck endpoints: the cargo a truck carries, cargo near it, and telemetry.

use crate::{error::AppError, extractors::Actor, state::AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use fleetops_core::cargo::Cargo;
use fleetops_core::truck::Truck;
use fleetops_core::TruckId;
use fleetops_runtime::tracking::DEFAULT_NEARBY_RADIUS_KM;
use fleetops_runtime::TelemetryFix;
use serde::Deserialize;

/// Query of `GET /api/trucks/:truck_id/nearby-cargo`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NearbyQuery {
    /// Search radius in kilometers
    pub radius: Option<f64>,
}

/// `GET /api/trucks/:truck_id/cargo`
pub async fn cargo(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(truck_id): Path<TruckId>,
) -> Result<Json<Vec<Cargo>>, AppError> {
    let cargo = state.tracking.list_by_truck(actor.tenant_id, truck_id).await?;
    Ok(Json(cargo))
}

/// `GET /api/trucks/:truck_id/nearby-cargo?radius=`
///
/// Unassigned cargo whose origin lies within `radius` km (default 50) of the
/// truck's last reported position.
pub async fn nearby_cargo(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(truck_id): Path<TruckId>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<Cargo>>, AppError> {
    let radius = query.radius.unwrap_or(DEFAULT_NEARBY_RADIUS_KM);
    let cargo = state
        .tracking
        .nearby_for_truck(actor.tenant_id, truck_id, radius)
        .await?;
    Ok(Json(cargo))
}

/// `POST /api/trucks/:truck_id/location`
pub async fn update_location(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(truck_id): Path<TruckId>,
    Json(fix): Json<TelemetryFix>,
) -> Result<Json<Truck>, AppError> {
    let truck = state
        .telemetry
        .update_truck_location(&actor, truck_id, fix)
        .await?;
    Ok(Json(truck))
}
