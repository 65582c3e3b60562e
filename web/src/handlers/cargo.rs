//! Cargo endpoints.
//!
//! Thin adapters over the runtime services: extract the caller, call one
//! operation, map the result. Mutations return the committed cargo; the
//! matching broadcast has already been published by the time the response
//! is written.

use crate::{error::AppError, extractors::Actor, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fleetops_core::cargo::{Cargo, CargoDraft, CargoUpdate};
use fleetops_core::geo::Coordinates;
use fleetops_core::ledger::{CargoEvent, EventReport};
use fleetops_core::{CargoId, TruckId};
use fleetops_runtime::TrackingView;
use serde::Deserialize;

/// Body of `POST /api/cargo/:id/assign`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AssignRequest {
    /// Truck to load the cargo onto
    pub truck_id: TruckId,
}

/// Body of `POST /api/cargo/:id/location`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRequest {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Human-readable label of the position
    #[serde(default)]
    pub location: Option<String>,
}

/// `POST /api/cargo`
pub async fn create(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(draft): Json<CargoDraft>,
) -> Result<(StatusCode, Json<Cargo>), AppError> {
    let cargo = state.lifecycle.create(&actor, draft).await?;
    Ok((StatusCode::CREATED, Json(cargo)))
}

/// `GET /api/cargo/unassigned`
pub async fn list_unassigned(
    State(state): State<AppState>,
    Actor(actor): Actor,
) -> Result<Json<Vec<Cargo>>, AppError> {
    let cargo = state.tracking.list_unassigned(actor.tenant_id).await?;
    Ok(Json(cargo))
}

/// `GET /api/cargo/:id`
pub async fn get(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
) -> Result<Json<Cargo>, AppError> {
    let cargo = state.tracking.get(actor.tenant_id, id).await?;
    Ok(Json(cargo))
}

/// `PUT /api/cargo/:id`
pub async fn update(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
    Json(changes): Json<CargoUpdate>,
) -> Result<Json<Cargo>, AppError> {
    let cargo = state.lifecycle.update(&actor, id, changes).await?;
    Ok(Json(cargo))
}

/// `DELETE /api/cargo/:id`
pub async fn delete(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
) -> Result<StatusCode, AppError> {
    state.lifecycle.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/cargo/:id/assign`
pub async fn assign(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Cargo>, AppError> {
    let cargo = state
        .lifecycle
        .assign_to_truck(&actor, id, request.truck_id)
        .await?;
    Ok(Json(cargo))
}

/// `POST /api/cargo/:id/unassign`
pub async fn unassign(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
) -> Result<Json<Cargo>, AppError> {
    let cargo = state.lifecycle.unassign_from_truck(&actor, id).await?;
    Ok(Json(cargo))
}

/// `GET /api/cargo/:id/events`, newest first.
pub async fn list_events(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
) -> Result<Json<Vec<CargoEvent>>, AppError> {
    let events = state.ledger.history(actor.tenant_id, id).await?;
    Ok(Json(events))
}

/// `POST /api/cargo/:id/events`
pub async fn record_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
    Json(report): Json<EventReport>,
) -> Result<(StatusCode, Json<CargoEvent>), AppError> {
    let event = state.lifecycle.record_event(&actor, id, report).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `POST /api/cargo/:id/location`
pub async fn update_location(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<Cargo>, AppError> {
    let coordinates = Coordinates::new(request.latitude, request.longitude);
    let cargo = state
        .lifecycle
        .update_location(&actor, id, coordinates, request.location)
        .await?;
    Ok(Json(cargo))
}

/// `GET /api/cargo/:id/route`, the ledger entries that carry coordinates.
pub async fn route(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(id): Path<CargoId>,
) -> Result<Json<Vec<CargoEvent>>, AppError> {
    let events = state.ledger.route(actor.tenant_id, id).await?;
    Ok(Json(events))
}

/// `GET /api/cargo/track/:tracking_code`
pub async fn track(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(tracking_code): Path<String>,
) -> Result<Json<TrackingView>, AppError> {
    let view = state.tracking.track(actor.tenant_id, &tracking_code).await?;
    Ok(Json(view))
}
