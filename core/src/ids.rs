//! Strongly-typed identifiers.
//!
//! Every entity is keyed by a `BIGINT` in the relational store. Wrapping the
//! raw integer keeps a `TruckId` from ever being passed where a `CargoId` is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Tenant (company) identifier. Scopes every other entity.
    TenantId
);
id_type!(
    /// User identifier, used for acting users and drivers.
    UserId
);
id_type!(
    /// Truck identifier.
    TruckId
);
id_type!(
    /// Cargo shipment identifier.
    CargoId
);
id_type!(
    /// Ledger entry identifier. Allocated in creation order.
    CargoEventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&CargoId::new(42)).unwrap_or_default();
        assert_eq!(json, "42");

        let parsed: TenantId = serde_json::from_str("7").unwrap_or(TenantId::new(0));
        assert_eq!(parsed, TenantId::new(7));
    }

    #[test]
    fn ids_display_raw_value() {
        assert_eq!(TruckId::new(3).to_string(), "3");
    }
}
