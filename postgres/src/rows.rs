//! Row shapes and their conversion into domain types.

use chrono::{DateTime, Utc};
use fleetops_core::cargo::{Cargo, Endpoint};
use fleetops_core::geo::Coordinates;
use fleetops_core::ledger::{CargoEvent, EventKind};
use fleetops_core::store::StoreError;
use fleetops_core::truck::{Truck, TruckLocation};
use fleetops_core::{CargoEventId, CargoId, TenantId, TruckId, UserId};
use std::str::FromStr;

/// Column list matching [`CargoRow`].
pub(crate) const CARGO_COLUMNS: &str = "id, tenant_id, tracking_code, title, description, \
    cargo_type, priority, status, truck_id, weight, volume, value, currency, \
    origin_address, origin_latitude, origin_longitude, origin_contact, origin_phone, \
    destination_address, destination_latitude, destination_longitude, destination_contact, destination_phone, \
    pickup_time, delivery_time, estimated_delivery, actual_pickup, actual_delivery, \
    assigned_by, assigned_at, instructions, special_handling, \
    current_latitude, current_longitude, current_location, last_updated, created_at, updated_at";

/// Column list matching [`TruckRow`].
pub(crate) const TRUCK_COLUMNS: &str = "id, tenant_id, license_plate, model, status, driver_id, \
    is_approved, last_latitude, last_longitude, last_speed, last_heading, last_location_at";

/// Column list matching [`EventRow`].
pub(crate) const EVENT_COLUMNS: &str =
    "id, cargo_id, tenant_id, event_type, description, location, latitude, longitude, user_id, recorded_at";

fn parse<T>(value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Serialization(e.to_string()))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CargoRow {
    id: i64,
    tenant_id: i64,
    tracking_code: String,
    title: String,
    description: Option<String>,
    cargo_type: String,
    priority: String,
    status: String,
    truck_id: Option<i64>,
    weight: f64,
    volume: f64,
    value: f64,
    currency: String,
    origin_address: String,
    origin_latitude: Option<f64>,
    origin_longitude: Option<f64>,
    origin_contact: Option<String>,
    origin_phone: Option<String>,
    destination_address: String,
    destination_latitude: Option<f64>,
    destination_longitude: Option<f64>,
    destination_contact: Option<String>,
    destination_phone: Option<String>,
    pickup_time: Option<DateTime<Utc>>,
    delivery_time: Option<DateTime<Utc>>,
    estimated_delivery: Option<DateTime<Utc>>,
    actual_pickup: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    assigned_by: Option<i64>,
    assigned_at: Option<DateTime<Utc>>,
    instructions: Option<String>,
    special_handling: bool,
    current_latitude: Option<f64>,
    current_longitude: Option<f64>,
    current_location: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CargoRow> for Cargo {
    type Error = StoreError;

    fn try_from(row: CargoRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CargoId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            tracking_code: row.tracking_code,
            title: row.title,
            description: row.description,
            cargo_type: parse(&row.cargo_type)?,
            priority: parse(&row.priority)?,
            status: parse(&row.status)?,
            truck_id: row.truck_id.map(TruckId::new),
            weight: row.weight,
            volume: row.volume,
            value: row.value,
            currency: row.currency,
            origin: Endpoint {
                address: row.origin_address,
                coordinates: Coordinates::from_parts(row.origin_latitude, row.origin_longitude),
                contact: row.origin_contact,
                phone: row.origin_phone,
            },
            destination: Endpoint {
                address: row.destination_address,
                coordinates: Coordinates::from_parts(
                    row.destination_latitude,
                    row.destination_longitude,
                ),
                contact: row.destination_contact,
                phone: row.destination_phone,
            },
            pickup_time: row.pickup_time,
            delivery_time: row.delivery_time,
            estimated_delivery: row.estimated_delivery,
            actual_pickup: row.actual_pickup,
            actual_delivery: row.actual_delivery,
            assigned_by: row.assigned_by.map(UserId::new),
            assigned_at: row.assigned_at,
            instructions: row.instructions,
            special_handling: row.special_handling,
            current_position: Coordinates::from_parts(row.current_latitude, row.current_longitude),
            current_location: row.current_location,
            last_updated: row.last_updated,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TruckRow {
    id: i64,
    tenant_id: i64,
    license_plate: String,
    model: Option<String>,
    status: String,
    driver_id: Option<i64>,
    is_approved: bool,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    last_speed: Option<f64>,
    last_heading: Option<f64>,
    last_location_at: Option<DateTime<Utc>>,
}

impl TryFrom<TruckRow> for Truck {
    type Error = StoreError;

    fn try_from(row: TruckRow) -> Result<Self, Self::Error> {
        let last_location = match (row.last_latitude, row.last_longitude, row.last_location_at) {
            (Some(latitude), Some(longitude), Some(recorded_at)) => Some(TruckLocation {
                latitude,
                longitude,
                speed: row.last_speed.unwrap_or_default(),
                heading: row.last_heading.unwrap_or_default(),
                recorded_at,
            }),
            _ => None,
        };

        Ok(Self {
            id: TruckId::new(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            license_plate: row.license_plate,
            model: row.model,
            status: parse(&row.status)?,
            driver_id: row.driver_id.map(UserId::new),
            is_approved: row.is_approved,
            last_location,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    id: i64,
    cargo_id: i64,
    tenant_id: i64,
    event_type: String,
    description: String,
    location: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    user_id: i64,
    recorded_at: DateTime<Utc>,
}

impl From<EventRow> for CargoEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: CargoEventId::new(row.id),
            cargo_id: CargoId::new(row.cargo_id),
            tenant_id: TenantId::new(row.tenant_id),
            kind: EventKind::from(row.event_type),
            description: row.description,
            location: row.location,
            coordinates: Coordinates::from_parts(row.latitude, row.longitude),
            actor: UserId::new(row.user_id),
            recorded_at: row.recorded_at,
        }
    }
}

/// Convert every row, failing on the first undecodable one.
pub(crate) fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
