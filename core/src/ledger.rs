//! Append-only cargo ledger entries.
//!
//! Entries are written by the lifecycle and never updated or deleted. History
//! is read newest first; the route view is the subset of those entries that
//! carry coordinates.

use crate::geo::Coordinates;
use crate::ids::{CargoEventId, CargoId, TenantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a ledger entry.
///
/// Well-known kinds get their own variant; custom milestones recorded through
/// the lifecycle are kept verbatim in [`EventKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Cargo created
    Created,
    /// Assigned to a truck
    Assigned,
    /// Unassigned from a truck
    Unassigned,
    /// Status changed through a general update
    StatusChange,
    /// Picked up at the origin
    Pickup,
    /// Delivered at the destination
    Delivery,
    /// Real-time position report
    LocationUpdate,
    /// Any other milestone
    Other(String),
}

impl EventKind {
    /// Database / wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::Unassigned => "unassigned",
            Self::StatusChange => "status_change",
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
            Self::LocationUpdate => "location_update",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "created" => Self::Created,
            "assigned" => Self::Assigned,
            "unassigned" => Self::Unassigned,
            "status_change" => Self::StatusChange,
            "pickup" => Self::Pickup,
            "delivery" => Self::Delivery,
            "location_update" => Self::LocationUpdate,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ledger entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCargoEvent {
    /// Entry kind
    pub kind: EventKind,
    /// Human-readable description
    pub description: String,
    /// Location label
    pub location: Option<String>,
    /// Where it happened
    pub coordinates: Option<Coordinates>,
    /// Acting user
    pub actor: UserId,
    /// When it happened
    pub recorded_at: DateTime<Utc>,
}

impl NewCargoEvent {
    /// Entry without location data.
    #[must_use]
    pub fn new(
        kind: EventKind,
        description: impl Into<String>,
        actor: UserId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            location: None,
            coordinates: None,
            actor,
            recorded_at,
        }
    }

    /// Attach a location label and coordinates.
    #[must_use]
    pub fn at(mut self, location: Option<String>, coordinates: Option<Coordinates>) -> Self {
        self.location = location;
        self.coordinates = coordinates;
        self
    }

    /// Turn into a stored entry once the store has allocated an id.
    #[must_use]
    pub fn into_event(self, id: CargoEventId, cargo_id: CargoId, tenant_id: TenantId) -> CargoEvent {
        CargoEvent {
            id,
            cargo_id,
            tenant_id,
            kind: self.kind,
            description: self.description,
            location: self.location,
            coordinates: self.coordinates,
            actor: self.actor,
            recorded_at: self.recorded_at,
        }
    }
}

/// A milestone reported by a caller, before the lifecycle applies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventReport {
    /// Milestone kind
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Location label
    #[serde(default)]
    pub location: Option<String>,
    /// Where it happened
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl EventReport {
    /// Report of `kind` with a description and no location.
    #[must_use]
    pub fn new(kind: impl Into<EventKind>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            location: None,
            coordinates: None,
        }
    }

    /// Attach where it happened.
    #[must_use]
    pub fn at(mut self, location: Option<String>, coordinates: Option<Coordinates>) -> Self {
        self.location = location;
        self.coordinates = coordinates;
        self
    }
}

/// A stored ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoEvent {
    /// Identifier, increasing in append order
    pub id: CargoEventId,
    /// Cargo the entry belongs to
    pub cargo_id: CargoId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Entry kind
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Human-readable description
    pub description: String,
    /// Location label
    pub location: Option<String>,
    /// Where it happened
    pub coordinates: Option<Coordinates>,
    /// Acting user
    #[serde(rename = "user_id")]
    pub actor: UserId,
    /// When it happened
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// Order entries newest first. Ties on time are broken by id, so two entries
/// recorded in the same instant still come out in reverse append order.
pub fn newest_first(events: &mut [CargoEvent]) {
    events.sort_by(|a, b| {
        b.recorded_at
            .cmp(&a.recorded_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Entries carrying coordinates, in the order given.
#[must_use]
pub fn route_events(events: &[CargoEvent]) -> Vec<CargoEvent> {
    events
        .iter()
        .filter(|e| e.coordinates.is_some())
        .cloned()
        .collect()
}
