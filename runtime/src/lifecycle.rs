//! Cargo lifecycle service.
//!
//! [`CargoLifecycle`] is the imperative shell around
//! [`CargoReducer`](fleetops_core::lifecycle::CargoReducer). Every mutating
//! operation runs as:
//!
//! 1. begin a transaction bound to the caller's tenant
//! 2. lock the cargo row (and the truck row the command touches)
//! 3. reduce the command against the locked snapshot
//! 4. persist `SaveCargo` / `SaveTruck` / `AppendLedger` effects and commit
//! 5. publish `Broadcast` effects to the tenant through the [`EventHub`]
//!
//! Failures before commit roll back and publish nothing. Broadcasting happens
//! only after a successful commit and never blocks.

use crate::hub::EventHub;
use crate::metrics::LifecycleMetrics;
use chrono::{DateTime, Utc};
use fleetops_core::broadcast::{BroadcastMessage, MessageKind};
use fleetops_core::cargo::{tracking_code, Cargo, CargoDraft, CargoUpdate};
use fleetops_core::environment::Clock;
use fleetops_core::geo::Coordinates;
use fleetops_core::ledger::{CargoEvent, EventReport};
use fleetops_core::lifecycle::{
    created_entry, CargoCommand, CargoEffect, CargoReducer, CargoSnapshot, LifecycleEnv,
    LifecycleError,
};
use fleetops_core::reducer::Reducer;
use fleetops_core::store::{FleetStore, FleetTransaction};
use fleetops_core::truck::Truck;
use fleetops_core::{ActorContext, CargoId, TenantId, TruckId};
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Committed result of one lifecycle command.
#[derive(Debug, Clone)]
struct Applied {
    cargo: Cargo,
    truck: Option<Truck>,
    events: Vec<CargoEvent>,
    broadcasts: SmallVec<[MessageKind; 2]>,
    at: DateTime<Utc>,
}

/// State machine for cargo shipments and their coupling to truck status.
#[derive(Clone)]
pub struct CargoLifecycle {
    store: Arc<dyn FleetStore>,
    hub: EventHub,
    clock: Arc<dyn Clock>,
    reducer: CargoReducer,
}

impl std::fmt::Debug for CargoLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CargoLifecycle")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl CargoLifecycle {
    /// Wire the service to its collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn FleetStore>, hub: EventHub, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            hub,
            clock,
            reducer: CargoReducer,
        }
    }

    /// Create a `pending` cargo with a fresh tracking code and a `created`
    /// ledger entry, then broadcast `cargo_created`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Validation`] if the draft is malformed
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn create(
        &self,
        actor: &ActorContext,
        draft: CargoDraft,
    ) -> Result<Cargo, LifecycleError> {
        let started = Instant::now();
        let result = self.create_inner(actor, draft).await;
        match result {
            Ok(cargo) => {
                LifecycleMetrics::record_transition("create", started.elapsed());
                info!(
                    tenant_id = %actor.tenant_id,
                    cargo_id = %cargo.id,
                    tracking_code = %cargo.tracking_code,
                    "Cargo created"
                );
                self.publish(actor.tenant_id, MessageKind::CargoCreated, payload_of(&cargo));
                Ok(cargo)
            }
            Err(e) => Err(failed("create", actor.tenant_id, e)),
        }
    }

    async fn create_inner(
        &self,
        actor: &ActorContext,
        draft: CargoDraft,
    ) -> Result<Cargo, LifecycleError> {
        draft.validate().map_err(LifecycleError::Validation)?;

        let mut tx = self.store.begin(actor.tenant_id).await?;
        let sequence = tx.next_tracking_sequence().await?;
        let code = tracking_code(actor.tenant_id, sequence);
        let now = self.clock.now();

        let cargo = tx
            .insert_cargo(draft.into_cargo(actor.tenant_id, code, now))
            .await?;
        tx.append_event(cargo.id, created_entry(&cargo, actor.user_id, now))
            .await?;
        tx.commit().await?;
        Ok(cargo)
    }

    /// Put a cargo on a truck. An `offline` truck becomes `in_use`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] / [`LifecycleError::TruckNotFound`] outside the tenant
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn assign_to_truck(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
        truck_id: TruckId,
    ) -> Result<Cargo, LifecycleError> {
        let command = CargoCommand::Assign {
            truck_id,
            actor: actor.user_id,
        };
        Ok(self.execute(actor, cargo_id, command).await?.cargo)
    }

    /// Take a cargo off its truck and reset it to `pending`. The truck comes
    /// back `online` when nothing else is on it.
    ///
    /// Calling this on a cargo without a truck changes nothing and emits
    /// nothing.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] outside the tenant
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn unassign_from_truck(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
    ) -> Result<Cargo, LifecycleError> {
        let command = CargoCommand::Unassign {
            actor: actor.user_id,
        };
        Ok(self.execute(actor, cargo_id, command).await?.cargo)
    }

    /// Patch a cargo. A changed status is recorded as `status_change`; the
    /// status itself is not checked against any transition graph.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] outside the tenant
    /// - [`LifecycleError::Validation`] if the patch is malformed
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn update(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
        update: CargoUpdate,
    ) -> Result<Cargo, LifecycleError> {
        let command = CargoCommand::Update {
            update,
            actor: actor.user_id,
        };
        Ok(self.execute(actor, cargo_id, command).await?.cargo)
    }

    /// Record a transit milestone. `pickup` moves the cargo to `in_transit`
    /// and `delivery` to `delivered`; other kinds only append.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] outside the tenant
    /// - [`LifecycleError::Validation`] for a blank kind or bad coordinates
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn record_event(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
        report: EventReport,
    ) -> Result<CargoEvent, LifecycleError> {
        let command = CargoCommand::RecordEvent {
            kind: report.kind,
            description: report.description,
            location: report.location,
            coordinates: report.coordinates,
            actor: actor.user_id,
        };
        let mut applied = self.execute(actor, cargo_id, command).await?;
        applied.events.pop().ok_or_else(|| {
            LifecycleError::InconsistentState {
                cargo_id,
                reason: "milestone committed without a ledger entry".to_string(),
            }
        })
    }

    /// Report a cargo's real-time position. The status is left as is.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] outside the tenant
    /// - [`LifecycleError::Validation`] for out-of-range coordinates
    /// - [`LifecycleError::Persistence`] / [`LifecycleError::InconsistentState`] from the store
    pub async fn update_location(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
        coordinates: Coordinates,
        label: Option<String>,
    ) -> Result<Cargo, LifecycleError> {
        let command = CargoCommand::UpdateLocation {
            coordinates,
            label,
            actor: actor.user_id,
        };
        Ok(self.execute(actor, cargo_id, command).await?.cargo)
    }

    /// Soft-delete a cargo and broadcast `cargo_deleted`.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::CargoNotFound`] outside the tenant or already deleted
    /// - [`LifecycleError::Persistence`] from the store
    pub async fn delete(&self, actor: &ActorContext, cargo_id: CargoId) -> Result<(), LifecycleError> {
        let started = Instant::now();

        match self.delete_inner(actor.tenant_id, cargo_id).await {
            Ok(now) => {
                LifecycleMetrics::record_transition("delete", started.elapsed());
                info!(tenant_id = %actor.tenant_id, cargo_id = %cargo_id, "Cargo deleted");
                self.publish(
                    actor.tenant_id,
                    MessageKind::CargoDeleted,
                    Ok(json!({ "cargo_id": cargo_id, "timestamp": now })),
                );
                Ok(())
            }
            Err(e) => Err(failed("delete", actor.tenant_id, e)),
        }
    }

    async fn delete_inner(
        &self,
        tenant_id: TenantId,
        cargo_id: CargoId,
    ) -> Result<DateTime<Utc>, LifecycleError> {
        let mut tx = self.store.begin(tenant_id).await?;
        if tx.lock_cargo(cargo_id).await?.is_none() {
            return Err(LifecycleError::CargoNotFound(cargo_id));
        }
        let now = self.clock.now();
        if !tx.soft_delete_cargo(cargo_id, now).await? {
            return Err(LifecycleError::CargoNotFound(cargo_id));
        }
        tx.commit().await?;
        Ok(now)
    }

    async fn execute(
        &self,
        actor: &ActorContext,
        cargo_id: CargoId,
        command: CargoCommand,
    ) -> Result<Applied, LifecycleError> {
        let name = command.name();
        let started = Instant::now();

        match self.apply(actor.tenant_id, cargo_id, command).await {
            Ok(applied) => {
                if !applied.broadcasts.is_empty() {
                    LifecycleMetrics::record_transition(name, started.elapsed());
                    info!(
                        tenant_id = %actor.tenant_id,
                        cargo_id = %cargo_id,
                        kind = name,
                        status = %applied.cargo.status,
                        "Cargo lifecycle transition"
                    );
                }
                for kind in &applied.broadcasts {
                    self.publish(actor.tenant_id, *kind, broadcast_payload(*kind, &applied));
                }
                Ok(applied)
            }
            Err(e) => Err(failed(name, actor.tenant_id, e)),
        }
    }

    async fn apply(
        &self,
        tenant_id: TenantId,
        cargo_id: CargoId,
        command: CargoCommand,
    ) -> Result<Applied, LifecycleError> {
        let mut tx = self.store.begin(tenant_id).await?;

        let cargo = tx
            .lock_cargo(cargo_id)
            .await?
            .ok_or(LifecycleError::CargoNotFound(cargo_id))?;
        // stamped under the row lock so stamps follow apply order
        let now = self.clock.now();

        let (truck, other_cargo_on_truck) = match command.subject_truck(&cargo) {
            Some(truck_id) => {
                let truck = tx.lock_truck(truck_id).await?;
                let others = if truck.is_some() {
                    tx.count_cargo_on_truck(truck_id, cargo_id).await?
                } else {
                    0
                };
                (truck, others)
            }
            None => (None, 0),
        };

        let mut snapshot = CargoSnapshot::new(cargo, truck, other_cargo_on_truck);
        let effects = self
            .reducer
            .reduce(&mut snapshot, command, &LifecycleEnv::at(now))?;

        let mut applied = Applied {
            cargo: snapshot.cargo,
            truck: snapshot.truck,
            events: Vec::new(),
            broadcasts: SmallVec::new(),
            at: now,
        };

        if effects.is_empty() {
            // nothing to persist; dropping the transaction releases the locks
            return Ok(applied);
        }

        for effect in effects {
            persist(tx.as_mut(), effect, &mut applied).await?;
        }
        tx.commit().await?;
        Ok(applied)
    }

    fn publish(&self, tenant_id: TenantId, kind: MessageKind, payload: Result<Value, serde_json::Error>) {
        match payload {
            Ok(data) => {
                self.hub
                    .broadcast_to_tenant(tenant_id, BroadcastMessage::new(kind, data));
            }
            Err(e) => {
                warn!(tenant_id = %tenant_id, kind = %kind, error = %e, "Skipping broadcast, payload not serializable");
            }
        }
    }
}

fn failed(operation: &'static str, tenant_id: TenantId, error: LifecycleError) -> LifecycleError {
    LifecycleMetrics::record_error(error.kind());
    match &error {
        LifecycleError::InconsistentState { cargo_id, reason } => {
            error!(
                tenant_id = %tenant_id,
                cargo_id = %cargo_id,
                operation,
                reason = %reason,
                "Cargo row committed without its ledger entry; reconciliation required"
            );
        }
        LifecycleError::Persistence(e) => {
            warn!(tenant_id = %tenant_id, operation, error = %e, "Lifecycle operation failed");
        }
        _ => {
            tracing::debug!(tenant_id = %tenant_id, operation, error = %error, "Lifecycle operation rejected");
        }
    }
    error
}

async fn persist(
    tx: &mut dyn FleetTransaction,
    effect: CargoEffect,
    applied: &mut Applied,
) -> Result<(), LifecycleError> {
    match effect {
        CargoEffect::SaveCargo => tx.update_cargo(&applied.cargo).await?,
        CargoEffect::SaveTruck => {
            if let Some(truck) = &applied.truck {
                tx.update_truck(truck).await?;
            }
        }
        CargoEffect::AppendLedger(entry) => {
            let event = tx.append_event(applied.cargo.id, entry).await?;
            applied.events.push(event);
        }
        CargoEffect::Broadcast(kind) => applied.broadcasts.push(kind),
    }
    Ok(())
}

fn payload_of<T: serde::Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

fn broadcast_payload(kind: MessageKind, applied: &Applied) -> Result<Value, serde_json::Error> {
    match kind {
        MessageKind::CargoEvent => match applied.events.last() {
            Some(event) => payload_of(event),
            None => payload_of(&applied.cargo),
        },
        MessageKind::CargoLocationUpdate => {
            let position = applied.cargo.current_position;
            Ok(json!({
                "cargo_id": applied.cargo.id,
                "latitude": position.map(|p| p.latitude),
                "longitude": position.map(|p| p.longitude),
                "location": applied.cargo.current_location,
                "timestamp": applied.at,
            }))
        }
        _ => payload_of(&applied.cargo),
    }
}
