//! Great-circle distance and travel time

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average city travel speed
pub const TRAVEL_SPEED_KMH: f64 = 20.0;

/// Haversine distance in kilometres between two `(lat, lon)` points in degrees
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Whole minutes needed to cover `distance_km` at [`TRAVEL_SPEED_KMH`]
pub fn travel_minutes(distance_km: f64) -> i64 {
    (distance_km / TRAVEL_SPEED_KMH * 60.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_equator_degree() {
        let d = haversine_km((0.0, 0.0), (0.0, 0.18));
        assert!((d - 20.015).abs() < 0.01, "got {}", d);
        assert_eq!(travel_minutes(d), 60);
    }

    #[test]
    fn test_known_city_pair() {
        // Paris to London is roughly 344 km
        let d = haversine_km((48.8566, 2.3522), (51.5074, -0.1278));
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(haversine_km((35.0, 139.0), (35.0, 139.0)), 0.0);
    }

    proptest! {
        #[test]
        fn haversine_is_symmetric(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let a = haversine_km((lat1, lon1), (lat2, lon2));
            let b = haversine_km((lat2, lon2), (lat1, lon1));
            prop_assert!((a - b).abs() < 1e-6);
            prop_assert!(a >= 0.0);
            prop_assert!(a <= std::f64::consts::PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
