//! Error types for the compliance monitor.

use thiserror::Error;
use warden_geofence::GeofenceError;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised while configuring or running the compliance monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Work area or position failed geometric validation.
    #[error("invalid work area: {0}")]
    InvalidWorkArea(#[from] GeofenceError),

    /// A tuning parameter is out of its allowed range.
    #[error("invalid monitor configuration: {0}")]
    InvalidConfig(String),
}

/// Failures reported by the platform location service.
///
/// None of these terminate a monitoring session; the platform keeps
/// retrying on its own cadence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The user has not granted location permission.
    #[error("location permission denied")]
    PermissionDenied,

    /// The platform could not produce a fix.
    #[error("position unavailable: {0}")]
    Unavailable(String),

    /// No fix arrived within the profile timeout.
    #[error("timed out waiting for a position fix")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geofence_error_passthrough() {
        let err: MonitorError = GeofenceError::InvalidRadius(0.0).into();
        assert!(err.to_string().contains("invalid work area"));
    }

    #[test]
    fn test_sensor_error_display() {
        assert_eq!(
            SensorError::PermissionDenied.to_string(),
            "location permission denied"
        );
        assert!(SensorError::Unavailable("gps off".to_string())
            .to_string()
            .contains("gps off"));
    }
}
