//! Real-time messages pushed to connected observers.
//!
//! On the wire every message is `{"type": <kind>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Catalogue of broadcast message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A cargo was created
    CargoCreated,
    /// A cargo was assigned to a truck
    CargoAssigned,
    /// A cargo was unassigned from its truck
    CargoUnassigned,
    /// A cargo was changed through a general update
    CargoUpdated,
    /// A milestone was recorded
    CargoEvent,
    /// A cargo's real-time position changed
    CargoLocationUpdate,
    /// A cargo was deleted
    CargoDeleted,
    /// A truck reported a telemetry fix
    LocationUpdate,
}

impl MessageKind {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CargoCreated => "cargo_created",
            Self::CargoAssigned => "cargo_assigned",
            Self::CargoUnassigned => "cargo_unassigned",
            Self::CargoUpdated => "cargo_updated",
            Self::CargoEvent => "cargo_event",
            Self::CargoLocationUpdate => "cargo_location_update",
            Self::CargoDeleted => "cargo_deleted",
            Self::LocationUpdate => "location_update",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, tenant-agnostic broadcast message.
///
/// The tenant scope is supplied when the message is handed to the hub, not
/// carried in the message itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Payload
    pub data: Value,
}

impl BroadcastMessage {
    /// Create a message from an already-built payload.
    #[must_use]
    pub const fn new(kind: MessageKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Create a message by serializing `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` cannot be represented as JSON.
    pub fn from_payload<T: Serialize>(kind: MessageKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Encode for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
