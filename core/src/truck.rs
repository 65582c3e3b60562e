//! Trucks and their operational status.

use crate::geo::Coordinates;
use crate::ids::{TenantId, TruckId, UserId};
use crate::cargo::ParseEnumError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operational status of a truck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckStatus {
    /// Not reporting
    #[default]
    Offline,
    /// Reporting, no cargo aboard
    Online,
    /// Carrying at least one cargo
    InUse,
    /// Out of service
    Maintenance,
}

impl TruckStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::InUse => "in_use",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for TruckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TruckStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(Self::Offline),
            "online" => Ok(Self::Online),
            "in_use" => Ok(Self::InUse),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(ParseEnumError::new("truck status", s)),
        }
    }
}

/// Last reported telemetry fix of a truck.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruckLocation {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Ground speed in km/h
    pub speed: f64,
    /// Heading in degrees from north
    pub heading: f64,
    /// When the fix was recorded
    pub recorded_at: DateTime<Utc>,
}

impl TruckLocation {
    /// Position part of the fix.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A vehicle of a tenant's fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    /// Identifier
    pub id: TruckId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// License plate, used in ledger descriptions
    pub license_plate: String,
    /// Vehicle model
    pub model: Option<String>,
    /// Operational status
    pub status: TruckStatus,
    /// Assigned driver
    pub driver_id: Option<UserId>,
    /// Approved for dispatch
    pub is_approved: bool,
    /// Most recent telemetry fix
    pub last_location: Option<TruckLocation>,
}

impl Truck {
    /// Apply a telemetry fix. An offline truck comes online; other statuses
    /// are kept.
    pub fn record_location(&mut self, location: TruckLocation) {
        self.last_location = Some(location);
        if self.status == TruckStatus::Offline {
            self.status = TruckStatus::Online;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck(status: TruckStatus) -> Truck {
        Truck {
            id: TruckId::new(1),
            tenant_id: TenantId::new(1),
            license_plate: "ABC-123".to_string(),
            model: None,
            status,
            driver_id: None,
            is_approved: true,
            last_location: None,
        }
    }

    fn fix() -> TruckLocation {
        TruckLocation {
            latitude: 41.0,
            longitude: 69.0,
            speed: 60.0,
            heading: 90.0,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn location_brings_offline_truck_online() {
        let mut t = truck(TruckStatus::Offline);
        t.record_location(fix());
        assert_eq!(t.status, TruckStatus::Online);
        assert!(t.last_location.is_some());
    }

    #[test]
    fn location_keeps_busy_status() {
        let mut t = truck(TruckStatus::InUse);
        t.record_location(fix());
        assert_eq!(t.status, TruckStatus::InUse);

        let mut t = truck(TruckStatus::Maintenance);
        t.record_location(fix());
        assert_eq!(t.status, TruckStatus::Maintenance);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TruckStatus::InUse).unwrap_or_default();
        assert_eq!(json, "\"in_use\"");
        assert_eq!("in_use".parse::<TruckStatus>(), Ok(TruckStatus::InUse));
    }
}
