//! Given-When-Then scenarios for the cargo lifecycle reducer.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};
use fleetops_core::broadcast::MessageKind;
use fleetops_core::cargo::{Cargo, CargoStatus, CargoUpdate};
use fleetops_core::environment::Clock;
use fleetops_core::geo::Coordinates;
use fleetops_core::ledger::EventKind;
use fleetops_core::lifecycle::{CargoCommand, CargoReducer, CargoSnapshot, LifecycleEnv, LifecycleError};
use fleetops_core::truck::{Truck, TruckStatus};
use fleetops_core::{CargoId, TruckId, UserId};
use fleetops_testing::fixtures::{self, TENANT};
use fleetops_testing::{assertions, properties, test_clock, ReducerTest};
use proptest::prelude::*;

const DISPATCHER: UserId = UserId::new(7);

fn now() -> DateTime<Utc> {
    test_clock().now()
}

fn pending_cargo() -> Cargo {
    let mut cargo = fixtures::draft("Grain").into_cargo(TENANT, "TRK1000001".to_string(), now());
    cargo.id = CargoId::new(1);
    cargo
}

fn truck(status: TruckStatus) -> Truck {
    let mut truck = fixtures::truck(TENANT, "01A777AA", status);
    truck.id = TruckId::new(9);
    truck
}

fn assigned_cargo() -> Cargo {
    let mut cargo = pending_cargo();
    cargo.status = CargoStatus::Assigned;
    cargo.truck_id = Some(TruckId::new(9));
    cargo.assigned_by = Some(DISPATCHER);
    cargo
}

fn test() -> ReducerTest<CargoReducer> {
    ReducerTest::new(CargoReducer).with_env(LifecycleEnv::at(now()))
}

#[test]
fn assigning_to_an_offline_truck_puts_it_in_use() {
    test()
        .given_state(CargoSnapshot::new(pending_cargo(), Some(truck(TruckStatus::Offline)), 0))
        .when_action(CargoCommand::Assign {
            truck_id: TruckId::new(9),
            actor: DISPATCHER,
        })
        .then_state(|snapshot| {
            assert_eq!(snapshot.cargo.status, CargoStatus::Assigned);
            assert_eq!(snapshot.cargo.assigned_at, Some(now()));
            assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::InUse);
        })
        .then_effects(|effects| {
            assertions::assert_saves_truck(effects);
            assertions::assert_ledger_kinds(effects, &[EventKind::Assigned]);
            assertions::assert_broadcasts(effects, MessageKind::CargoAssigned);
        })
        .run();
}

#[test]
fn assigning_to_a_truck_in_maintenance_keeps_its_status() {
    test()
        .given_state(CargoSnapshot::new(
            pending_cargo(),
            Some(truck(TruckStatus::Maintenance)),
            0,
        ))
        .when_action(CargoCommand::Assign {
            truck_id: TruckId::new(9),
            actor: DISPATCHER,
        })
        .then_state(|snapshot| {
            assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::Maintenance);
        })
        .then_effects(|effects| {
            assertions::assert_truck_untouched(effects);
            assertions::assert_effects_count(effects, 3);
        })
        .run();
}

#[test]
fn assigning_to_an_unresolved_truck_is_rejected_untouched() {
    test()
        .given_state(CargoSnapshot::new(pending_cargo(), None, 0))
        .when_action(CargoCommand::Assign {
            truck_id: TruckId::new(404),
            actor: DISPATCHER,
        })
        .then_state(|snapshot| {
            assert_eq!(snapshot.cargo, pending_cargo());
        })
        .then_error(|error| {
            assert!(matches!(error, LifecycleError::TruckNotFound(id) if *id == TruckId::new(404)));
        })
        .run();
}

#[test]
fn last_cargo_off_the_truck_brings_it_online() {
    test()
        .given_state(CargoSnapshot::new(assigned_cargo(), Some(truck(TruckStatus::InUse)), 0))
        .when_action(CargoCommand::Unassign { actor: DISPATCHER })
        .then_state(|snapshot| {
            assert_eq!(snapshot.cargo.status, CargoStatus::Pending);
            assert_eq!(snapshot.cargo.truck_id, None);
            assert_eq!(snapshot.cargo.assigned_by, None);
            assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::Online);
        })
        .then_effects(|effects| {
            assertions::assert_saves_truck(effects);
            assertions::assert_ledger_kinds(effects, &[EventKind::Unassigned]);
            assertions::assert_broadcasts(effects, MessageKind::CargoUnassigned);
        })
        .run();
}

#[test]
fn truck_with_other_cargo_stays_in_use() {
    test()
        .given_state(CargoSnapshot::new(assigned_cargo(), Some(truck(TruckStatus::InUse)), 2))
        .when_action(CargoCommand::Unassign { actor: DISPATCHER })
        .then_state(|snapshot| {
            assert_eq!(snapshot.truck.as_ref().unwrap().status, TruckStatus::InUse);
        })
        .then_effects(assertions::assert_truck_untouched)
        .run();
}

#[test]
fn unassigning_unassigned_cargo_does_nothing() {
    test()
        .given_state(CargoSnapshot::new(pending_cargo(), None, 0))
        .when_action(CargoCommand::Unassign { actor: DISPATCHER })
        .then_state(|snapshot| assert_eq!(snapshot.cargo, pending_cargo()))
        .then_effects(|effects| assertions::assert_effects_count(effects, 0))
        .run();
}

#[test]
fn delivery_milestone_stamps_actual_delivery() {
    test()
        .given_state(CargoSnapshot::new(assigned_cargo(), None, 0))
        .when_action(CargoCommand::RecordEvent {
            kind: EventKind::Delivery,
            description: "Signed by consignee".to_string(),
            location: Some("Yard B".to_string()),
            coordinates: Some(Coordinates::new(1.0, 1.0)),
            actor: DISPATCHER,
        })
        .then_state(|snapshot| {
            assert_eq!(snapshot.cargo.status, CargoStatus::Delivered);
            assert_eq!(snapshot.cargo.actual_delivery, Some(now()));
            assert_eq!(snapshot.cargo.actual_pickup, None);
        })
        .then_effects(|effects| {
            assertions::assert_ledger_kinds(effects, &[EventKind::Delivery]);
            assertions::assert_broadcasts(effects, MessageKind::CargoEvent);
        })
        .run();
}

#[test]
fn free_form_event_leaves_status_alone() {
    test()
        .given_state(CargoSnapshot::new(assigned_cargo(), None, 0))
        .when_action(CargoCommand::RecordEvent {
            kind: EventKind::from("checkpoint"),
            description: "Border crossing".to_string(),
            location: None,
            coordinates: None,
            actor: DISPATCHER,
        })
        .then_state(|snapshot| assert_eq!(snapshot.cargo.status, CargoStatus::Assigned))
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 2);
            assertions::assert_ledger_kinds(effects, &[EventKind::from("checkpoint")]);
        })
        .run();
}

#[test]
fn administrative_status_change_is_recorded() {
    test()
        .given_state(CargoSnapshot::new(pending_cargo(), None, 0))
        .when_action(CargoCommand::Update {
            update: CargoUpdate {
                status: Some(CargoStatus::Cancelled),
                ..CargoUpdate::default()
            },
            actor: DISPATCHER,
        })
        .then_state(|snapshot| assert_eq!(snapshot.cargo.status, CargoStatus::Cancelled))
        .then_effects(|effects| {
            assertions::assert_ledger_kinds(effects, &[EventKind::StatusChange]);
            assertions::assert_broadcasts(effects, MessageKind::CargoUpdated);
        })
        .run();
}

#[test]
fn out_of_range_location_is_rejected() {
    test()
        .given_state(CargoSnapshot::new(pending_cargo(), None, 0))
        .when_action(CargoCommand::UpdateLocation {
            coordinates: Coordinates::new(0.0, 181.0),
            label: None,
            actor: DISPATCHER,
        })
        .then_state(|snapshot| assert_eq!(snapshot.cargo.current_position, None))
        .then_error(|error| assert!(matches!(error, LifecycleError::Validation(_))))
        .run();
}

proptest! {
    #[test]
    fn location_updates_never_change_status(
        status in properties::cargo_status(),
        coordinates in properties::coordinates(),
    ) {
        let mut cargo = pending_cargo();
        cargo.status = status;

        test()
            .given_state(CargoSnapshot::new(cargo, None, 0))
            .when_action(CargoCommand::UpdateLocation {
                coordinates,
                label: None,
                actor: DISPATCHER,
            })
            .then_state(move |snapshot| {
                assert_eq!(snapshot.cargo.status, status);
                assert_eq!(snapshot.cargo.current_position, Some(coordinates));
            })
            .then_effects(|effects| {
                assertions::assert_ledger_kinds(effects, &[EventKind::LocationUpdate]);
                assertions::assert_broadcasts(effects, MessageKind::CargoLocationUpdate);
            })
            .run();
    }
}
