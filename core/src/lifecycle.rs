//! The cargo lifecycle as a pure reducer.
//!
//! [`CargoReducer`] decides every state change of a cargo and the truck it is
//! coupled to. It never performs I/O: the runtime loads and locks a
//! [`CargoSnapshot`], calls [`Reducer::reduce`], then persists and publishes
//! the returned [`CargoEffect`]s.
//!
//! A rejected command leaves the snapshot untouched and yields no effects.

use crate::broadcast::MessageKind;
use crate::cargo::{Cargo, CargoStatus, CargoUpdate};
use crate::geo::Coordinates;
use crate::ids::{CargoId, TruckId, UserId};
use crate::ledger::{EventKind, NewCargoEvent};
use crate::reducer::Reducer;
use crate::store::StoreError;
use crate::truck::{Truck, TruckStatus};
use chrono::{DateTime, Utc};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

/// Description of the ledger entry written when a cargo is created.
pub const CREATED_DESCRIPTION: &str = "Cargo created and ready for assignment";

/// Description of the ledger entry written when a cargo is unassigned.
pub const UNASSIGNED_DESCRIPTION: &str = "Cargo unassigned from truck";

/// Description of the ledger entry written for a position report.
pub const LOCATION_DESCRIPTION: &str = "Location updated during transit";

/// Errors surfaced by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The cargo does not exist in the caller's tenant.
    #[error("Cargo not found: {0}")]
    CargoNotFound(CargoId),

    /// No live cargo carries this tracking code in the caller's tenant.
    #[error("Tracking code not found: {0}")]
    TrackingCodeNotFound(String),

    /// The truck does not exist in the caller's tenant.
    #[error("Truck not found: {0}")]
    TruckNotFound(TruckId),

    /// Reserved for a strict transition graph; not raised today.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: CargoStatus,
        /// Requested status
        to: CargoStatus,
    },

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The storage collaborator failed; nothing was committed.
    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),

    /// The cargo row was committed but its ledger entry was not.
    #[error("Inconsistent state for cargo {cargo_id}: {reason}")]
    InconsistentState {
        /// Cargo needing reconciliation
        cargo_id: CargoId,
        /// What failed
        reason: String,
    },
}

impl LifecycleError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CargoNotFound(_) | Self::TrackingCodeNotFound(_) | Self::TruckNotFound(_) => {
                "not_found"
            }
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation",
            Self::Persistence(_) => "persistence",
            Self::InconsistentState { .. } => "inconsistent_state",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::PartialCommit { cargo_id, reason } => {
                Self::InconsistentState { cargo_id, reason }
            }
            other => Self::Persistence(other),
        }
    }
}

/// A mutating lifecycle command on an existing cargo.
#[derive(Debug, Clone, PartialEq)]
pub enum CargoCommand {
    /// Put the cargo on a truck.
    Assign {
        /// Target truck
        truck_id: TruckId,
        /// Acting user
        actor: UserId,
    },
    /// Take the cargo off its truck. No-op when it has none.
    Unassign {
        /// Acting user
        actor: UserId,
    },
    /// Patch fields, including an unrestricted status overwrite.
    Update {
        /// Fields to change
        update: CargoUpdate,
        /// Acting user
        actor: UserId,
    },
    /// Record a transit milestone.
    RecordEvent {
        /// Milestone kind; `pickup` and `delivery` also move the status
        kind: EventKind,
        /// Human-readable description
        description: String,
        /// Location label
        location: Option<String>,
        /// Where it happened
        coordinates: Option<Coordinates>,
        /// Acting user
        actor: UserId,
    },
    /// Report the cargo's real-time position.
    UpdateLocation {
        /// New position
        coordinates: Coordinates,
        /// Location label
        label: Option<String>,
        /// Acting user
        actor: UserId,
    },
}

impl CargoCommand {
    /// Truck whose row must be locked alongside the cargo.
    #[must_use]
    pub const fn subject_truck(&self, cargo: &Cargo) -> Option<TruckId> {
        match self {
            Self::Assign { truck_id, .. } => Some(*truck_id),
            Self::Unassign { .. } => cargo.truck_id,
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::Unassign { .. } => "unassign",
            Self::Update { .. } => "update",
            Self::RecordEvent { .. } => "record_event",
            Self::UpdateLocation { .. } => "update_location",
        }
    }
}

/// Locked state a command is applied to.
#[derive(Debug, Clone, PartialEq)]
pub struct CargoSnapshot {
    /// The cargo
    pub cargo: Cargo,
    /// The truck named by [`CargoCommand::subject_truck`], if it resolved
    pub truck: Option<Truck>,
    /// Live cargo on that truck other than this one
    pub other_cargo_on_truck: usize,
}

impl CargoSnapshot {
    /// Bundle locked rows.
    #[must_use]
    pub const fn new(cargo: Cargo, truck: Option<Truck>, other_cargo_on_truck: usize) -> Self {
        Self {
            cargo,
            truck,
            other_cargo_on_truck,
        }
    }
}

/// Side effects requested by the reducer, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub enum CargoEffect {
    /// Persist the snapshot's cargo.
    SaveCargo,
    /// Persist the snapshot's truck.
    SaveTruck,
    /// Append a ledger entry for the snapshot's cargo.
    AppendLedger(NewCargoEvent),
    /// Publish to the cargo's tenant once committed.
    Broadcast(MessageKind),
}

/// Injected context for one reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleEnv {
    /// The instant stamped on every change
    pub now: DateTime<Utc>,
}

impl LifecycleEnv {
    /// Environment pinned to `now`.
    #[must_use]
    pub const fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// Timestamp field a milestone stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneStamp {
    /// [`Cargo::actual_pickup`]
    ActualPickup,
    /// [`Cargo::actual_delivery`]
    ActualDelivery,
}

/// A ledger kind that also forces a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    /// Ledger kind
    pub kind: &'static str,
    /// Forced status
    pub status: CargoStatus,
    /// Stamped field
    pub stamp: MilestoneStamp,
}

impl Milestone {
    fn apply(&self, cargo: &mut Cargo, now: DateTime<Utc>) {
        cargo.status = self.status;
        match self.stamp {
            MilestoneStamp::ActualPickup => cargo.actual_pickup = Some(now),
            MilestoneStamp::ActualDelivery => cargo.actual_delivery = Some(now),
        }
    }
}

/// Event kinds with side effects on the cargo.
pub static MILESTONES: &[Milestone] = &[
    Milestone {
        kind: "pickup",
        status: CargoStatus::InTransit,
        stamp: MilestoneStamp::ActualPickup,
    },
    Milestone {
        kind: "delivery",
        status: CargoStatus::Delivered,
        stamp: MilestoneStamp::ActualDelivery,
    },
];

/// Look up the side effects of an event kind.
#[must_use]
pub fn milestone_for(kind: &EventKind) -> Option<&'static Milestone> {
    MILESTONES.iter().find(|m| m.kind == kind.as_str())
}

/// Ledger entry written when `cargo` is created. Carries the origin so the
/// route starts there.
#[must_use]
pub fn created_entry(cargo: &Cargo, actor: UserId, now: DateTime<Utc>) -> NewCargoEvent {
    NewCargoEvent::new(EventKind::Created, CREATED_DESCRIPTION, actor, now).at(
        Some(cargo.origin.address.clone()),
        cargo.origin.coordinates,
    )
}

/// Reducer for [`CargoCommand`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CargoReducer;

type Effects = SmallVec<[CargoEffect; 4]>;

impl Reducer for CargoReducer {
    type State = CargoSnapshot;
    type Action = CargoCommand;
    type Environment = LifecycleEnv;
    type Effect = CargoEffect;
    type Error = LifecycleError;

    fn reduce(
        &self,
        state: &mut CargoSnapshot,
        action: CargoCommand,
        env: &LifecycleEnv,
    ) -> Result<Effects, LifecycleError> {
        match action {
            CargoCommand::Assign { truck_id, actor } => assign(state, truck_id, actor, env.now),
            CargoCommand::Unassign { actor } => Ok(unassign(state, actor, env.now)),
            CargoCommand::Update { update, actor } => update_cargo(state, update, actor, env.now),
            CargoCommand::RecordEvent {
                kind,
                description,
                location,
                coordinates,
                actor,
            } => record_event(state, kind, description, location, coordinates, actor, env.now),
            CargoCommand::UpdateLocation {
                coordinates,
                label,
                actor,
            } => update_location(state, coordinates, label, actor, env.now),
        }
    }
}

fn assign(
    state: &mut CargoSnapshot,
    truck_id: TruckId,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Effects, LifecycleError> {
    let Some(truck) = state.truck.as_mut().filter(|t| t.id == truck_id) else {
        return Err(LifecycleError::TruckNotFound(truck_id));
    };

    let cargo = &mut state.cargo;
    cargo.truck_id = Some(truck_id);
    cargo.status = CargoStatus::Assigned;
    cargo.assigned_by = Some(actor);
    cargo.assigned_at = Some(now);
    cargo.updated_at = now;

    let mut effects: Effects = smallvec![CargoEffect::SaveCargo];

    if truck.status == TruckStatus::Offline {
        truck.status = TruckStatus::InUse;
        effects.push(CargoEffect::SaveTruck);
    }

    let description = format!("Cargo assigned to truck {}", truck.license_plate);
    effects.push(CargoEffect::AppendLedger(NewCargoEvent::new(
        EventKind::Assigned,
        description,
        actor,
        now,
    )));
    effects.push(CargoEffect::Broadcast(MessageKind::CargoAssigned));
    Ok(effects)
}

fn unassign(state: &mut CargoSnapshot, actor: UserId, now: DateTime<Utc>) -> Effects {
    let Some(previous) = state.cargo.truck_id else {
        return Effects::new();
    };

    let cargo = &mut state.cargo;
    cargo.truck_id = None;
    cargo.status = CargoStatus::Pending;
    cargo.assigned_by = None;
    cargo.assigned_at = None;
    cargo.updated_at = now;

    let mut effects: Effects = smallvec![CargoEffect::SaveCargo];

    if state.other_cargo_on_truck == 0 {
        if let Some(truck) = state.truck.as_mut().filter(|t| t.id == previous) {
            truck.status = TruckStatus::Online;
            effects.push(CargoEffect::SaveTruck);
        }
    }

    effects.push(CargoEffect::AppendLedger(NewCargoEvent::new(
        EventKind::Unassigned,
        UNASSIGNED_DESCRIPTION,
        actor,
        now,
    )));
    effects.push(CargoEffect::Broadcast(MessageKind::CargoUnassigned));
    effects
}

fn update_cargo(
    state: &mut CargoSnapshot,
    update: CargoUpdate,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Effects, LifecycleError> {
    update.validate().map_err(LifecycleError::Validation)?;

    let cargo = &mut state.cargo;
    let old_status = cargo.status;
    update.apply_to(cargo);
    cargo.updated_at = now;

    let mut effects: Effects = smallvec![CargoEffect::SaveCargo];
    if cargo.status != old_status {
        let description = format!("Status changed from {old_status} to {}", cargo.status);
        effects.push(CargoEffect::AppendLedger(NewCargoEvent::new(
            EventKind::StatusChange,
            description,
            actor,
            now,
        )));
    }
    effects.push(CargoEffect::Broadcast(MessageKind::CargoUpdated));
    Ok(effects)
}

fn record_event(
    state: &mut CargoSnapshot,
    kind: EventKind,
    description: String,
    location: Option<String>,
    coordinates: Option<Coordinates>,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Effects, LifecycleError> {
    if kind.as_str().trim().is_empty() {
        return Err(LifecycleError::Validation("event type is required".to_string()));
    }
    if let Some(coordinates) = &coordinates {
        coordinates.validate().map_err(LifecycleError::Validation)?;
    }

    let mut effects = Effects::new();
    if let Some(milestone) = milestone_for(&kind) {
        milestone.apply(&mut state.cargo, now);
        state.cargo.updated_at = now;
        effects.push(CargoEffect::SaveCargo);
    }

    effects.push(CargoEffect::AppendLedger(
        NewCargoEvent::new(kind, description, actor, now).at(location, coordinates),
    ));
    effects.push(CargoEffect::Broadcast(MessageKind::CargoEvent));
    Ok(effects)
}

fn update_location(
    state: &mut CargoSnapshot,
    coordinates: Coordinates,
    label: Option<String>,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<Effects, LifecycleError> {
    coordinates.validate().map_err(LifecycleError::Validation)?;

    let cargo = &mut state.cargo;
    cargo.current_position = Some(coordinates);
    cargo.current_location.clone_from(&label);
    cargo.last_updated = Some(now);
    cargo.updated_at = now;

    Ok(smallvec![
        CargoEffect::SaveCargo,
        CargoEffect::AppendLedger(
            NewCargoEvent::new(EventKind::LocationUpdate, LOCATION_DESCRIPTION, actor, now)
                .at(label, Some(coordinates)),
        ),
        CargoEffect::Broadcast(MessageKind::CargoLocationUpdate),
    ])
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::cargo::{CargoDraft, Endpoint};
    use crate::ids::TenantId;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn cargo() -> Cargo {
        let mut cargo = CargoDraft {
            title: "Steel coils".to_string(),
            origin: Endpoint {
                address: "Yard A".to_string(),
                coordinates: Some(Coordinates::new(0.0, 0.0)),
                ..Endpoint::default()
            },
            destination: Endpoint {
                address: "Yard B".to_string(),
                coordinates: Some(Coordinates::new(1.0, 1.0)),
                ..Endpoint::default()
            },
            ..CargoDraft::default()
        }
        .into_cargo(TenantId::new(1), "TRK1000001".to_string(), now());
        cargo.id = CargoId::new(10);
        cargo
    }

    fn truck(status: TruckStatus) -> Truck {
        Truck {
            id: TruckId::new(3),
            tenant_id: TenantId::new(1),
            license_plate: "01A123BC".to_string(),
            model: None,
            status,
            driver_id: None,
            is_approved: true,
            last_location: None,
        }
    }

    fn reduce(snapshot: &mut CargoSnapshot, command: CargoCommand) -> Result<Effects, LifecycleError> {
        CargoReducer.reduce(snapshot, command, &LifecycleEnv::at(now()))
    }

    fn ledger_kinds(effects: &Effects) -> Vec<EventKind> {
        effects
            .iter()
            .filter_map(|e| match e {
                CargoEffect::AppendLedger(entry) => Some(entry.kind.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn assign_to_offline_truck_marks_it_in_use() {
        let mut snapshot = CargoSnapshot::new(cargo(), Some(truck(TruckStatus::Offline)), 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::Assign {
                truck_id: TruckId::new(3),
                actor: UserId::new(5),
            },
        )
        .unwrap();

        assert_eq!(snapshot.cargo.status, CargoStatus::Assigned);
        assert_eq!(snapshot.cargo.truck_id, Some(TruckId::new(3)));
        assert_eq!(snapshot.cargo.assigned_by, Some(UserId::new(5)));
        assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::InUse);
        assert!(effects.contains(&CargoEffect::SaveTruck));
        assert_eq!(ledger_kinds(&effects), vec![EventKind::Assigned]);
        assert_eq!(
            effects.last(),
            Some(&CargoEffect::Broadcast(MessageKind::CargoAssigned))
        );
    }

    #[test]
    fn assign_entry_names_the_plate() {
        let mut snapshot = CargoSnapshot::new(cargo(), Some(truck(TruckStatus::Online)), 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::Assign {
                truck_id: TruckId::new(3),
                actor: UserId::new(5),
            },
        )
        .unwrap();

        let description = effects.iter().find_map(|e| match e {
            CargoEffect::AppendLedger(entry) => Some(entry.description.clone()),
            _ => None,
        });
        assert_eq!(description.as_deref(), Some("Cargo assigned to truck 01A123BC"));
    }

    #[test]
    fn assign_to_online_truck_leaves_truck_status() {
        let mut snapshot = CargoSnapshot::new(cargo(), Some(truck(TruckStatus::Online)), 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::Assign {
                truck_id: TruckId::new(3),
                actor: UserId::new(5),
            },
        )
        .unwrap();

        assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::Online);
        assert!(!effects.contains(&CargoEffect::SaveTruck));
    }

    #[test]
    fn assign_to_missing_truck_is_rejected_without_changes() {
        let original = cargo();
        let mut snapshot = CargoSnapshot::new(original.clone(), None, 0);
        let result = reduce(
            &mut snapshot,
            CargoCommand::Assign {
                truck_id: TruckId::new(99),
                actor: UserId::new(5),
            },
        );

        assert!(matches!(result, Err(LifecycleError::TruckNotFound(id)) if id == TruckId::new(99)));
        assert_eq!(snapshot.cargo, original);
    }

    #[test]
    fn unassign_without_truck_is_a_no_op() {
        let original = cargo();
        let mut snapshot = CargoSnapshot::new(original.clone(), None, 0);
        let effects = reduce(&mut snapshot, CargoCommand::Unassign { actor: UserId::new(5) }).unwrap();

        assert!(effects.is_empty());
        assert_eq!(snapshot.cargo, original);
    }

    #[test]
    fn unassign_frees_truck_when_it_carries_nothing_else() {
        let mut c = cargo();
        c.truck_id = Some(TruckId::new(3));
        c.status = CargoStatus::InTransit;
        c.assigned_by = Some(UserId::new(5));
        let mut snapshot = CargoSnapshot::new(c, Some(truck(TruckStatus::InUse)), 0);

        let effects = reduce(&mut snapshot, CargoCommand::Unassign { actor: UserId::new(5) }).unwrap();

        assert_eq!(snapshot.cargo.status, CargoStatus::Pending);
        assert!(snapshot.cargo.truck_id.is_none());
        assert!(snapshot.cargo.assigned_by.is_none());
        assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::Online);
        assert_eq!(ledger_kinds(&effects), vec![EventKind::Unassigned]);
    }

    #[test]
    fn unassign_keeps_truck_busy_while_other_cargo_remains() {
        let mut c = cargo();
        c.truck_id = Some(TruckId::new(3));
        c.status = CargoStatus::Assigned;
        let mut snapshot = CargoSnapshot::new(c, Some(truck(TruckStatus::InUse)), 2);

        let effects = reduce(&mut snapshot, CargoCommand::Unassign { actor: UserId::new(5) }).unwrap();

        assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::InUse);
        assert!(!effects.contains(&CargoEffect::SaveTruck));
    }

    #[test]
    fn unassign_after_delivery_resets_to_pending() {
        let mut c = cargo();
        c.truck_id = Some(TruckId::new(3));
        c.status = CargoStatus::Delivered;
        let mut snapshot = CargoSnapshot::new(c, Some(truck(TruckStatus::InUse)), 0);

        reduce(&mut snapshot, CargoCommand::Unassign { actor: UserId::new(5) }).unwrap();

        assert_eq!(snapshot.cargo.status, CargoStatus::Pending);
    }

    #[test]
    fn milestone_table_drives_status() {
        for (kind, status) in [
            (EventKind::Pickup, CargoStatus::InTransit),
            (EventKind::Delivery, CargoStatus::Delivered),
        ] {
            let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
            let effects = reduce(
                &mut snapshot,
                CargoCommand::RecordEvent {
                    kind: kind.clone(),
                    description: "milestone".to_string(),
                    location: None,
                    coordinates: None,
                    actor: UserId::new(5),
                },
            )
            .unwrap();

            assert_eq!(snapshot.cargo.status, status);
            assert_eq!(effects[0], CargoEffect::SaveCargo);
            assert_eq!(ledger_kinds(&effects), vec![kind]);
        }
    }

    #[test]
    fn pickup_and_delivery_stamp_their_fields() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        for kind in [EventKind::Pickup, EventKind::Delivery] {
            reduce(
                &mut snapshot,
                CargoCommand::RecordEvent {
                    kind,
                    description: String::new(),
                    location: None,
                    coordinates: None,
                    actor: UserId::new(5),
                },
            )
            .unwrap();
        }
        assert_eq!(snapshot.cargo.actual_pickup, Some(now()));
        assert_eq!(snapshot.cargo.actual_delivery, Some(now()));
    }

    #[test]
    fn custom_event_only_appends() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::RecordEvent {
                kind: EventKind::from("customs_hold"),
                description: "Held at border".to_string(),
                location: Some("Border post".to_string()),
                coordinates: Some(Coordinates::new(0.5, 0.5)),
                actor: UserId::new(5),
            },
        )
        .unwrap();

        assert_eq!(snapshot.cargo.status, CargoStatus::Pending);
        assert!(!effects.contains(&CargoEffect::SaveCargo));
        assert_eq!(
            effects.last(),
            Some(&CargoEffect::Broadcast(MessageKind::CargoEvent))
        );
    }

    #[test]
    fn blank_event_kind_is_rejected() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        let result = reduce(
            &mut snapshot,
            CargoCommand::RecordEvent {
                kind: EventKind::from(" "),
                description: String::new(),
                location: None,
                coordinates: None,
                actor: UserId::new(5),
            },
        );
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
    }

    #[test]
    fn status_overwrite_logs_a_status_change() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::Update {
                update: CargoUpdate {
                    status: Some(CargoStatus::Cancelled),
                    ..CargoUpdate::default()
                },
                actor: UserId::new(5),
            },
        )
        .unwrap();

        let entry = effects.iter().find_map(|e| match e {
            CargoEffect::AppendLedger(entry) => Some(entry.clone()),
            _ => None,
        });
        let entry = entry.unwrap();
        assert_eq!(entry.kind, EventKind::StatusChange);
        assert_eq!(entry.description, "Status changed from pending to cancelled");
        assert_eq!(
            effects.last(),
            Some(&CargoEffect::Broadcast(MessageKind::CargoUpdated))
        );
    }

    #[test]
    fn update_without_status_change_appends_nothing() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::Update {
                update: CargoUpdate {
                    title: Some("Copper coils".to_string()),
                    ..CargoUpdate::default()
                },
                actor: UserId::new(5),
            },
        )
        .unwrap();

        assert!(ledger_kinds(&effects).is_empty());
        assert_eq!(snapshot.cargo.title, "Copper coils");
    }

    #[test]
    fn location_update_keeps_status_and_sets_position() {
        let mut snapshot = CargoSnapshot::new(cargo(), None, 0);
        let effects = reduce(
            &mut snapshot,
            CargoCommand::UpdateLocation {
                coordinates: Coordinates::new(0.4, 0.6),
                label: Some("Highway 4".to_string()),
                actor: UserId::new(5),
            },
        )
        .unwrap();

        assert_eq!(snapshot.cargo.status, CargoStatus::Pending);
        assert_eq!(snapshot.cargo.current_position, Some(Coordinates::new(0.4, 0.6)));
        assert_eq!(snapshot.cargo.current_location.as_deref(), Some("Highway 4"));
        assert_eq!(snapshot.cargo.last_updated, Some(now()));
        assert_eq!(ledger_kinds(&effects), vec![EventKind::LocationUpdate]);
    }

    #[test]
    fn location_update_rejects_out_of_range_coordinates() {
        let original = cargo();
        let mut snapshot = CargoSnapshot::new(original.clone(), None, 0);
        let result = reduce(
            &mut snapshot,
            CargoCommand::UpdateLocation {
                coordinates: Coordinates::new(120.0, 0.0),
                label: None,
                actor: UserId::new(5),
            },
        );
        assert!(matches!(result, Err(LifecycleError::Validation(_))));
        assert_eq!(snapshot.cargo, original);
    }

    #[test]
    fn created_entry_starts_route_at_origin() {
        let entry = created_entry(&cargo(), UserId::new(5), now());
        assert_eq!(entry.kind, EventKind::Created);
        assert_eq!(entry.location.as_deref(), Some("Yard A"));
        assert_eq!(entry.coordinates, Some(Coordinates::new(0.0, 0.0)));
    }

    #[test]
    fn partial_commit_maps_to_inconsistent_state() {
        let error = LifecycleError::from(StoreError::PartialCommit {
            cargo_id: CargoId::new(10),
            reason: "ledger write failed".to_string(),
        });
        assert!(matches!(error, LifecycleError::InconsistentState { .. }));
        assert_eq!(error.kind(), "inconsistent_state");

        let error = LifecycleError::from(StoreError::Database("down".to_string()));
        assert!(matches!(error, LifecycleError::Persistence(_)));
    }
}
