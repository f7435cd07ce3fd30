//! Great-circle distance and the straight-line road estimate used when routing is unavailable.

use crate::model::Coordinate;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Ratio of road length to straight-line length for typical regional driving.
pub const ROAD_SINUOSITY: f64 = 1.3;

/// Haversine distance between two points in kilometers.
///
/// Non-finite inputs propagate as `NaN`.
#[must_use]
pub fn haversine_distance_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let hav = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let central_angle = 2.0 * hav.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Estimated driving distance derived from the haversine distance.
#[must_use]
pub fn road_distance_estimate_km(from: Coordinate, to: Coordinate) -> f64 {
    haversine_distance_km(from, to) * ROAD_SINUOSITY
}
