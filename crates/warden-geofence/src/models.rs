//! # Core Geofence Types
//!
//! Work-area definitions and position samples. Both are plain values:
//! a [`WorkAreaConfig`] is fixed for the lifetime of one monitoring session
//! and a [`Position`] is never mutated after capture.
//!
//! ## Validation
//!
//! Invalid coordinates never reach the evaluator. Work areas are checked
//! when they are constructed or deserialized (via [`WorkAreaConfig::validate`]),
//! and position samples are checked by the position feed before delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Result;

/// Validation failures for geofence inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    /// Radius was zero, negative, or not a finite number.
    #[error("work area radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    /// Latitude outside [-90, 90] or not finite.
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
}

fn check_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(GeofenceError::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeofenceError::InvalidLongitude(longitude));
    }
    Ok(())
}

/// A circular work area.
///
/// # Example
///
/// ```rust
/// use warden_geofence::WorkAreaConfig;
///
/// assert!(WorkAreaConfig::new(40.0, -74.0, 50.0).is_ok());
/// assert!(WorkAreaConfig::new(40.0, -74.0, 0.0).is_err());
/// assert!(WorkAreaConfig::new(91.0, -74.0, 50.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkAreaConfig {
    /// Latitude of the circle centre, in degrees.
    pub center_latitude: f64,
    /// Longitude of the circle centre, in degrees.
    pub center_longitude: f64,
    /// Radius in meters. Always > 0 once validated.
    pub radius_meters: f64,
}

impl WorkAreaConfig {
    /// Creates a validated work area.
    ///
    /// # Errors
    ///
    /// Returns a [`GeofenceError`] when the centre is not a valid coordinate
    /// or the radius is not a positive finite number.
    pub fn new(center_latitude: f64, center_longitude: f64, radius_meters: f64) -> Result<Self> {
        let config = Self {
            center_latitude,
            center_longitude,
            radius_meters,
        };
        config.validate()?;
        Ok(config)
    }

    /// Re-checks a config that may have been built field by field or
    /// deserialized from a file.
    pub fn validate(&self) -> Result<()> {
        check_coordinates(self.center_latitude, self.center_longitude)?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(GeofenceError::InvalidRadius(self.radius_meters));
        }
        Ok(())
    }
}

/// A single position fix reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Reported horizontal accuracy (68% confidence radius) in meters.
    pub accuracy_meters: f64,
    /// When the platform captured the fix.
    pub captured_at: DateTime<Utc>,
}

impl Position {
    /// Creates a position captured at the given instant.
    #[must_use]
    pub const fn new(
        latitude: f64,
        longitude: f64,
        accuracy_meters: f64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters,
            captured_at,
        }
    }

    /// Creates a position stamped with the current wall-clock time.
    #[must_use]
    pub fn now(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self::new(latitude, longitude, accuracy_meters, Utc::now())
    }

    /// Checks that the coordinates are on the globe.
    pub fn validate(&self) -> Result<()> {
        check_coordinates(self.latitude, self.longitude)
    }

    /// Great-circle distance to another fix, in meters.
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> f64 {
        crate::haversine_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_positive_radius() {
        assert_eq!(
            WorkAreaConfig::new(40.0, -74.0, 0.0),
            Err(GeofenceError::InvalidRadius(0.0))
        );
        assert_eq!(
            WorkAreaConfig::new(40.0, -74.0, -5.0),
            Err(GeofenceError::InvalidRadius(-5.0))
        );
        assert!(WorkAreaConfig::new(40.0, -74.0, f64::NAN).is_err());
        assert!(WorkAreaConfig::new(40.0, -74.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_centre() {
        assert!(matches!(
            WorkAreaConfig::new(90.5, 0.0, 10.0),
            Err(GeofenceError::InvalidLatitude(_))
        ));
        assert!(matches!(
            WorkAreaConfig::new(0.0, -180.5, 10.0),
            Err(GeofenceError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_accepts_poles_and_antimeridian() {
        assert!(WorkAreaConfig::new(90.0, 180.0, 1.0).is_ok());
        assert!(WorkAreaConfig::new(-90.0, -180.0, 1.0).is_ok());
    }

    #[test]
    fn test_deserialized_config_is_validated_explicitly() {
        let config: WorkAreaConfig = serde_json::from_str(
            r#"{"center_latitude": 40.0, "center_longitude": -74.0, "radius_meters": -1.0}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_position_validation() {
        assert!(Position::now(40.0, -74.0, 5.0).validate().is_ok());
        assert!(Position::now(f64::NAN, -74.0, 5.0).validate().is_err());
    }

    #[test]
    fn test_error_display() {
        let err = GeofenceError::InvalidRadius(-2.0);
        assert!(err.to_string().contains("-2"));
    }
}
