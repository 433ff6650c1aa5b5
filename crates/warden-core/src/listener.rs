//! Outward-facing callbacks and the published status snapshot.

use serde::{Deserialize, Serialize};
use warden_monitor::{AccuracyProfile, ComplianceState, SensorError};

/// Receives compliance notifications from a monitoring session.
///
/// Callbacks run on the session task and must not block.
///
/// # Example
///
/// ```rust
/// use warden_core::ComplianceListener;
///
/// struct Banner;
///
/// impl ComplianceListener for Banner {
///     fn on_violation_detected(&self, distance_meters: f64) {
///         eprintln!("outside work area ({distance_meters:.0} m)");
///     }
///     fn on_returned_to_compliance(&self) {
///         eprintln!("back inside work area");
///     }
///     fn on_network_error(&self) {
///         eprintln!("cannot reach the server");
///     }
/// }
/// ```
pub trait ComplianceListener: Send + Sync + 'static {
    /// The device left the work area.
    fn on_violation_detected(&self, distance_meters: f64);

    /// The device came back inside the work area.
    fn on_returned_to_compliance(&self);

    /// Heartbeat delivery reached the retry threshold for this outage.
    fn on_network_error(&self);

    /// The platform reported a location failure. The session keeps running.
    fn on_sensor_error(&self, _error: &SensorError) {}

    /// The collector ended the session (no active shift).
    fn on_session_ended(&self, _reason: &str) {}
}

/// Snapshot of the monitor, published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    /// Whether a session is running.
    pub running: bool,
    /// Current compliance state.
    pub state: ComplianceState,
    /// Profile of the current position watch.
    pub profile: AccuracyProfile,
    /// Distance from the work-area centre at the last evaluation.
    pub last_distance_meters: Option<f64>,
    /// Consecutive failed deliveries.
    pub failed_attempts: u32,
    /// Heartbeats waiting for delivery (0 or 1).
    pub pending_heartbeats: usize,
    /// Heartbeats accepted by the collector this session.
    pub delivered_heartbeats: u64,
}

impl MonitorStatus {
    /// Status of a monitor with no active session.
    #[must_use]
    pub const fn stopped() -> Self {
        Self {
            running: false,
            state: ComplianceState::Compliant,
            profile: AccuracyProfile::Relaxed,
            last_distance_meters: None,
            failed_attempts: 0,
            pending_heartbeats: 0,
            delivered_heartbeats: 0,
        }
    }
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self::stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_status_serializes() {
        let json = serde_json::to_value(MonitorStatus::stopped()).unwrap();
        assert_eq!(json["running"], false);
        assert_eq!(json["state"], "Compliant");
        assert_eq!(json["profile"], "Relaxed");
        assert!(json["last_distance_meters"].is_null());
    }
}
