//! Great-circle distance for proximity search.
//!
//! Used only as a filter predicate (`distance <= radius`), so a spherical
//! Earth model is accurate enough.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees, `-90..=90`
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a pair only when both halves are present.
    #[must_use]
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Self::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Check that both halves are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the pair is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range", self.latitude));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude {} out of range", self.longitude));
        }
        Ok(())
    }

    /// Great-circle distance to `other` in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Haversine distance between two points, in kilometers.
///
/// Symmetric in its arguments and zero for identical points.
///
/// ```
/// use fleetops_core::geo::distance_km;
///
/// assert_eq!(distance_km(10.0, 20.0, 10.0, 20.0), 0.0);
/// assert_eq!(distance_km(0.0, 0.0, 1.0, 1.0), distance_km(1.0, 1.0, 0.0, 0.0));
/// ```
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // abs() keeps the result bit-identical when the arguments are swapped.
    let d_lat = (lat2 - lat1).abs().to_radians();
    let d_lon = (lon2 - lon1).abs().to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lon = (d_lon / 2.0).sin();
    let cos_product = lat1.to_radians().cos() * lat2.to_radians().cos();

    let a = sin_lat.mul_add(sin_lat, cos_product * sin_lon * sin_lon).clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Whether `candidate` lies within `radius_km` of `center`.
#[must_use]
pub fn within_radius(center: &Coordinates, candidate: &Coordinates, radius_km: f64) -> bool {
    center.distance_km(candidate) <= radius_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn radius_filter_is_inclusive() {
        let center = Coordinates::new(0.0, 0.0);
        let target = Coordinates::new(0.0, 1.0);
        let d = center.distance_km(&target);
        assert!(within_radius(&center, &target, d));
        assert!(!within_radius(&center, &target, d - 0.001));
    }

    #[test]
    fn validation_rejects_out_of_range() {
        assert!(Coordinates::new(91.0, 0.0).validate().is_err());
        assert!(Coordinates::new(0.0, -180.5).validate().is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).validate().is_err());
        assert!(Coordinates::new(-90.0, 180.0).validate().is_ok());
    }

    #[test]
    fn from_parts_requires_both_halves() {
        assert!(Coordinates::from_parts(Some(1.0), None).is_none());
        assert_eq!(
            Coordinates::from_parts(Some(1.0), Some(2.0)),
            Some(Coordinates::new(1.0, 2.0))
        );
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            prop_assert_eq!(distance_km(lat, lon, lat, lon), 0.0);
        }

        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            prop_assert_eq!(
                distance_km(lat1, lon1, lat2, lon2),
                distance_km(lat2, lon2, lat1, lon1)
            );
        }

        #[test]
        fn distance_grows_with_separation(lon in 0.0f64..170.0, extra in 0.1f64..10.0) {
            let near = distance_km(0.0, 0.0, 0.0, lon);
            let far = distance_km(0.0, 0.0, 0.0, lon + extra);
            prop_assert!(far > near);
        }
    }
}
