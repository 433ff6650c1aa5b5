//! Error types for Shift Warden Core.

use thiserror::Error;

/// Core error type for warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Configuration file is missing, malformed, or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Work area failed validation at start.
    #[error("Invalid work area: {0}")]
    WorkArea(#[from] warden_geofence::GeofenceError),

    /// Monitor error passthrough.
    #[error("Monitor error: {0}")]
    Monitor(#[from] warden_monitor::MonitorError),

    /// Transport error passthrough.
    #[error("Transport error: {0}")]
    Transport(#[from] warden_transport::TransportError),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
