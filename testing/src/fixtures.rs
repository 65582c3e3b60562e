//! Ready-made domain values for tests.

use fleetops_core::cargo::{CargoDraft, Endpoint};
use fleetops_core::geo::Coordinates;
use fleetops_core::truck::{Truck, TruckStatus};
use fleetops_core::{ActorContext, TenantId, TruckId, UserId};

/// Tenant used by most tests.
pub const TENANT: TenantId = TenantId::new(1);

/// A second tenant for isolation tests.
pub const OTHER_TENANT: TenantId = TenantId::new(2);

/// An admin acting within `tenant_id`.
#[must_use]
pub fn admin(tenant_id: TenantId) -> ActorContext {
    ActorContext::new(tenant_id, UserId::new(100), "admin")
}

/// A truck with the given plate and status. The id is allocated by the store.
#[must_use]
pub fn truck(tenant_id: TenantId, plate: &str, status: TruckStatus) -> Truck {
    Truck {
        id: TruckId::new(0),
        tenant_id,
        license_plate: plate.to_string(),
        model: Some("Volvo FH16".to_string()),
        status,
        driver_id: None,
        is_approved: true,
        last_location: None,
    }
}

/// A draft travelling between two points.
#[must_use]
pub fn draft_between(title: &str, origin: Coordinates, destination: Coordinates) -> CargoDraft {
    CargoDraft {
        title: title.to_string(),
        weight: 500.0,
        volume: 2.5,
        origin: Endpoint {
            address: format!("{title} origin"),
            coordinates: Some(origin),
            ..Endpoint::default()
        },
        destination: Endpoint {
            address: format!("{title} destination"),
            coordinates: Some(destination),
            ..Endpoint::default()
        },
        ..CargoDraft::default()
    }
}

/// A draft from `(0, 0)` to `(1, 1)`.
#[must_use]
pub fn draft(title: &str) -> CargoDraft {
    draft_between(title, Coordinates::new(0.0, 0.0), Coordinates::new(1.0, 1.0))
}
