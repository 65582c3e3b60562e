//! Cargo shipments.
//!
//! A [`Cargo`] is created `pending`, is moved through its lifecycle exclusively
//! by the [`CargoReducer`](crate::lifecycle::CargoReducer), and is soft-deleted
//! externally.

use crate::geo::Coordinates;
use crate::ids::{CargoId, TenantId, TruckId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shipment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoStatus {
    /// Waiting for a truck
    Pending,
    /// Assigned to a truck, not yet picked up
    Assigned,
    /// Picked up and moving
    InTransit,
    /// Handed over at the destination
    Delivered,
    /// Abandoned
    Cancelled,
}

impl CargoStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Coarse completion percentage.
    ///
    /// Fixed and discrete: precise progress would need route-distance modeling.
    ///
    /// ```
    /// use fleetops_core::cargo::CargoStatus;
    ///
    /// assert_eq!(CargoStatus::Pending.progress(), 0);
    /// assert_eq!(CargoStatus::Delivered.progress(), 100);
    /// ```
    #[must_use]
    pub const fn progress(&self) -> u8 {
        match self {
            Self::Pending | Self::Cancelled => 0,
            Self::Assigned => 25,
            Self::InTransit => 75,
            Self::Delivered => 100,
        }
    }

    /// Statuses in which a truck reference is expected.
    #[must_use]
    pub const fn expects_truck(&self) -> bool {
        matches!(self, Self::Assigned | Self::InTransit)
    }
}

impl fmt::Display for CargoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for CargoStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "assigned" => Ok(Self::Assigned),
            "in_transit" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("cargo status", s)),
        }
    }
}

/// Kind of goods being shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoType {
    /// No special requirements
    #[default]
    General,
    /// Breakable
    Fragile,
    /// Dangerous goods
    Hazardous,
    /// Spoils over time
    Perishable,
    /// Bulk liquid
    Liquid,
    /// Exceeds standard dimensions
    Oversized,
}

impl CargoType {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Fragile => "fragile",
            Self::Hazardous => "hazardous",
            Self::Perishable => "perishable",
            Self::Liquid => "liquid",
            Self::Oversized => "oversized",
        }
    }
}

impl FromStr for CargoType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "fragile" => Ok(Self::Fragile),
            "hazardous" => Ok(Self::Hazardous),
            "perishable" => Ok(Self::Perishable),
            "liquid" => Ok(Self::Liquid),
            "oversized" => Ok(Self::Oversized),
            _ => Err(ParseEnumError::new("cargo type", s)),
        }
    }
}

/// Dispatch priority. Ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CargoPriority {
    /// Whenever convenient
    Low,
    /// Normal handling
    #[default]
    Medium,
    /// Ahead of normal
    High,
    /// Ahead of everything
    Urgent,
}

impl CargoPriority {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for CargoPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(ParseEnumError::new("cargo priority", s)),
        }
    }
}

/// Currency used when a shipment does not name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Pickup or drop-off point of a shipment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    /// Street address
    pub address: String,
    /// Geocoded position, if known
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Contact person on site
    #[serde(default)]
    pub contact: Option<String>,
    /// Contact phone number
    #[serde(default)]
    pub phone: Option<String>,
}

/// A shipment under transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    /// Identifier
    pub id: CargoId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Human-readable tracking code, unique and immutable
    pub tracking_code: String,
    /// Short title
    pub title: String,
    /// Free-form description
    pub description: Option<String>,
    /// Kind of goods
    pub cargo_type: CargoType,
    /// Dispatch priority
    pub priority: CargoPriority,
    /// Lifecycle status
    pub status: CargoStatus,
    /// Assigned truck
    pub truck_id: Option<TruckId>,
    /// Weight in kilograms
    pub weight: f64,
    /// Volume in cubic meters
    pub volume: f64,
    /// Declared monetary value
    pub value: f64,
    /// ISO currency code of `value`
    pub currency: String,
    /// Where the cargo is picked up
    pub origin: Endpoint,
    /// Where the cargo is delivered
    pub destination: Endpoint,
    /// Planned pickup time
    pub pickup_time: Option<DateTime<Utc>>,
    /// Planned delivery time
    pub delivery_time: Option<DateTime<Utc>>,
    /// Estimated delivery, passed through to tracking views
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Stamped by a `pickup` milestone
    pub actual_pickup: Option<DateTime<Utc>>,
    /// Stamped by a `delivery` milestone
    pub actual_delivery: Option<DateTime<Utc>>,
    /// Who assigned the current truck
    pub assigned_by: Option<UserId>,
    /// When the current truck was assigned
    pub assigned_at: Option<DateTime<Utc>>,
    /// Handling instructions
    pub instructions: Option<String>,
    /// Requires special handling
    pub special_handling: bool,
    /// Last reported real-time position
    pub current_position: Option<Coordinates>,
    /// Label of the last reported position
    pub current_location: Option<String>,
    /// When the position was last reported
    pub last_updated: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Cargo {
    /// Whether the cargo is waiting for a truck.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.status == CargoStatus::Pending && self.truck_id.is_none()
    }

    /// Coarse completion percentage derived from the status.
    #[must_use]
    pub const fn progress(&self) -> u8 {
        self.status.progress()
    }
}

/// Build a tracking code from a tenant and its per-tenant sequence number.
///
/// ```
/// use fleetops_core::cargo::tracking_code;
/// use fleetops_core::TenantId;
///
/// assert_eq!(tracking_code(TenantId::new(7), 12), "TRK7000012");
/// ```
#[must_use]
pub fn tracking_code(tenant_id: TenantId, sequence: u64) -> String {
    format!("TRK{tenant_id}{sequence:06}")
}

/// Shipment details supplied when creating a cargo.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CargoDraft {
    /// Short title (required)
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to [`CargoType::General`]
    #[serde(default, rename = "type")]
    pub cargo_type: Option<CargoType>,
    /// Defaults to [`CargoPriority::Medium`]
    #[serde(default)]
    pub priority: Option<CargoPriority>,
    /// Weight in kilograms
    #[serde(default)]
    pub weight: f64,
    /// Volume in cubic meters
    #[serde(default)]
    pub volume: f64,
    /// Declared monetary value
    #[serde(default)]
    pub value: f64,
    /// Defaults to [`DEFAULT_CURRENCY`]
    #[serde(default)]
    pub currency: Option<String>,
    /// Pickup point (address required)
    pub origin: Endpoint,
    /// Drop-off point (address required)
    pub destination: Endpoint,
    /// Planned pickup time
    #[serde(default)]
    pub pickup_time: Option<DateTime<Utc>>,
    /// Planned delivery time
    #[serde(default)]
    pub delivery_time: Option<DateTime<Utc>>,
    /// Estimated delivery
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// Handling instructions
    #[serde(default)]
    pub instructions: Option<String>,
    /// Requires special handling
    #[serde(default)]
    pub special_handling: bool,
}

impl CargoDraft {
    /// Check required fields and coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.origin.address.trim().is_empty() {
            return Err("origin address is required".to_string());
        }
        if self.destination.address.trim().is_empty() {
            return Err("destination address is required".to_string());
        }
        if self.weight < 0.0 || self.volume < 0.0 || self.value < 0.0 {
            return Err("weight, volume and value must not be negative".to_string());
        }
        for point in [&self.origin, &self.destination] {
            if let Some(coordinates) = &point.coordinates {
                coordinates.validate()?;
            }
        }
        Ok(())
    }

    /// Materialize a `pending` cargo with defaults applied.
    ///
    /// The identifier is a placeholder until the store assigns one on insert.
    #[must_use]
    pub fn into_cargo(
        self,
        tenant_id: TenantId,
        tracking_code: String,
        now: DateTime<Utc>,
    ) -> Cargo {
        let currency = self
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Cargo {
            id: CargoId::new(0),
            tenant_id,
            tracking_code,
            title: self.title,
            description: self.description,
            cargo_type: self.cargo_type.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            status: CargoStatus::Pending,
            truck_id: None,
            weight: self.weight,
            volume: self.volume,
            value: self.value,
            currency,
            origin: self.origin,
            destination: self.destination,
            pickup_time: self.pickup_time,
            delivery_time: self.delivery_time,
            estimated_delivery: self.estimated_delivery,
            actual_pickup: None,
            actual_delivery: None,
            assigned_by: None,
            assigned_at: None,
            instructions: self.instructions,
            special_handling: self.special_handling,
            current_position: None,
            current_location: None,
            last_updated: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// General-purpose partial update.
///
/// Absent fields are left untouched. Setting `status` here bypasses the
/// assign/unassign/milestone workflow and is meant for administrative
/// correction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoUpdate {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New cargo type
    #[serde(rename = "type")]
    pub cargo_type: Option<CargoType>,
    /// New priority
    pub priority: Option<CargoPriority>,
    /// New status
    pub status: Option<CargoStatus>,
    /// New weight
    pub weight: Option<f64>,
    /// New volume
    pub volume: Option<f64>,
    /// New value
    pub value: Option<f64>,
    /// New currency
    pub currency: Option<String>,
    /// Replacement pickup point
    pub origin: Option<Endpoint>,
    /// Replacement drop-off point
    pub destination: Option<Endpoint>,
    /// New planned pickup time
    pub pickup_time: Option<DateTime<Utc>>,
    /// New planned delivery time
    pub delivery_time: Option<DateTime<Utc>>,
    /// New estimated delivery
    pub estimated_delivery: Option<DateTime<Utc>>,
    /// New instructions
    pub instructions: Option<String>,
    /// New special-handling flag
    pub special_handling: Option<bool>,
}

impl CargoUpdate {
    /// Check value ranges of the fields being set.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("title must not be empty".to_string());
        }
        if [self.weight, self.volume, self.value]
            .iter()
            .flatten()
            .any(|v| *v < 0.0)
        {
            return Err("weight, volume and value must not be negative".to_string());
        }
        for point in [&self.origin, &self.destination].into_iter().flatten() {
            if point.address.trim().is_empty() {
                return Err("address must not be empty".to_string());
            }
            if let Some(coordinates) = &point.coordinates {
                coordinates.validate()?;
            }
        }
        Ok(())
    }

    /// Copy every present field onto `cargo`.
    pub fn apply_to(self, cargo: &mut Cargo) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *target = value;
            }
        }

        set(&mut cargo.title, self.title);
        set(&mut cargo.cargo_type, self.cargo_type);
        set(&mut cargo.priority, self.priority);
        set(&mut cargo.status, self.status);
        set(&mut cargo.weight, self.weight);
        set(&mut cargo.volume, self.volume);
        set(&mut cargo.value, self.value);
        set(&mut cargo.currency, self.currency);
        set(&mut cargo.origin, self.origin);
        set(&mut cargo.destination, self.destination);
        set(&mut cargo.special_handling, self.special_handling);

        if self.description.is_some() {
            cargo.description = self.description;
        }
        if self.pickup_time.is_some() {
            cargo.pickup_time = self.pickup_time;
        }
        if self.delivery_time.is_some() {
            cargo.delivery_time = self.delivery_time;
        }
        if self.estimated_delivery.is_some() {
            cargo.estimated_delivery = self.estimated_delivery;
        }
        if self.instructions.is_some() {
            cargo.instructions = self.instructions;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft() -> CargoDraft {
        CargoDraft {
            title: "Pallets".to_string(),
            weight: 120.0,
            origin: Endpoint {
                address: "Dock 1".to_string(),
                ..Endpoint::default()
            },
            destination: Endpoint {
                address: "Dock 2".to_string(),
                ..Endpoint::default()
            },
            ..CargoDraft::default()
        }
    }

    #[test]
    fn draft_defaults_are_applied() {
        let cargo = draft().into_cargo(TenantId::new(1), "TRK1000001".to_string(), Utc::now());
        assert_eq!(cargo.status, CargoStatus::Pending);
        assert_eq!(cargo.cargo_type, CargoType::General);
        assert_eq!(cargo.priority, CargoPriority::Medium);
        assert_eq!(cargo.currency, DEFAULT_CURRENCY);
        assert!(cargo.truck_id.is_none());
    }

    #[test]
    fn blank_currency_falls_back_to_default() {
        let mut d = draft();
        d.currency = Some("  ".to_string());
        let cargo = d.into_cargo(TenantId::new(1), "TRK1000001".to_string(), Utc::now());
        assert_eq!(cargo.currency, "USD");
    }

    #[test]
    fn draft_requires_addresses() {
        let mut d = draft();
        d.destination.address = String::new();
        assert!(d.validate().is_err());
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut cargo = draft().into_cargo(TenantId::new(1), "TRK1000001".to_string(), Utc::now());
        CargoUpdate {
            priority: Some(CargoPriority::Urgent),
            ..CargoUpdate::default()
        }
        .apply_to(&mut cargo);

        assert_eq!(cargo.priority, CargoPriority::Urgent);
        assert_eq!(cargo.title, "Pallets");
        assert_eq!(cargo.status, CargoStatus::Pending);
    }

    #[test]
    fn progress_mapping() {
        assert_eq!(CargoStatus::Pending.progress(), 0);
        assert_eq!(CargoStatus::Assigned.progress(), 25);
        assert_eq!(CargoStatus::InTransit.progress(), 75);
        assert_eq!(CargoStatus::Delivered.progress(), 100);
        assert_eq!(CargoStatus::Cancelled.progress(), 0);
    }

    #[test]
    fn status_parses_its_own_representation() {
        for status in [
            CargoStatus::Pending,
            CargoStatus::Assigned,
            CargoStatus::InTransit,
            CargoStatus::Delivered,
            CargoStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<CargoStatus>(), Ok(status));
        }
        assert!("lost".parse::<CargoStatus>().is_err());
    }

    #[test]
    fn priority_orders_low_to_urgent() {
        assert!(CargoPriority::Urgent > CargoPriority::High);
        assert!(CargoPriority::Medium > CargoPriority::Low);
    }

    fn any_status() -> impl Strategy<Value = CargoStatus> {
        prop_oneof![
            Just(CargoStatus::Pending),
            Just(CargoStatus::Assigned),
            Just(CargoStatus::InTransit),
            Just(CargoStatus::Delivered),
            Just(CargoStatus::Cancelled),
        ]
    }

    proptest! {
        #[test]
        fn progress_is_stable_and_bounded(status in any_status()) {
            let first = status.progress();
            prop_assert_eq!(first, status.progress());
            prop_assert!(first <= 100);
        }
    }
}
