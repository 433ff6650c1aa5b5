//! Great-circle distance and the work-area verdict.
//!
//! Everything here is a pure function of its inputs: no clocks, no logging,
//! no allocation. Calling [`evaluate`] twice with the same arguments yields
//! bit-identical results.

use serde::{Deserialize, Serialize};

use crate::models::{Position, WorkAreaConfig};

/// Mean Earth radius used for the spherical approximation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Outcome of evaluating one position against a work area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Great-circle distance from the work-area centre.
    pub distance_meters: f64,
    /// `distance_meters <= radius_meters`.
    pub in_range: bool,
}

/// Haversine distance between two coordinates, in meters.
///
/// # Example
///
/// ```rust
/// use warden_geofence::haversine_meters;
///
/// let d = haversine_meters(40.0, -74.0, 40.0, -74.0);
/// assert_eq!(d, 0.0);
/// ```
#[must_use]
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Evaluates a position against a work area.
///
/// The boundary is inclusive.
#[must_use]
pub fn evaluate(config: &WorkAreaConfig, pos: &Position) -> Evaluation {
    let distance_meters = haversine_meters(
        config.center_latitude,
        config.center_longitude,
        pos.latitude,
        pos.longitude,
    );
    Evaluation {
        distance_meters,
        in_range: distance_meters <= config.radius_meters,
    }
}

/// Point reached by travelling `distance_meters` from a start coordinate
/// along an initial bearing (degrees clockwise from north).
///
/// Returns `(latitude, longitude)` in degrees, longitude normalised to
/// [-180, 180].
#[must_use]
pub fn project(latitude: f64, longitude: f64, bearing_degrees: f64, distance_meters: f64) -> (f64, f64) {
    let delta = distance_meters / EARTH_RADIUS_METERS;
    let theta = bearing_degrees.to_radians();
    let phi1 = latitude.to_radians();
    let lambda1 = longitude.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;
    (phi2.to_degrees(), lon)
}
