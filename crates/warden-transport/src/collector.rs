//! Collector abstraction and the heartbeat wire format.
//!
//! ## Request
//!
//! ```text
//! POST {base_url}/shift-monitoring/heartbeat
//! Authorization: Bearer <token>
//! Content-Type: application/json
//!
//! {"latitude": 40.0, "longitude": -74.0, "timestamp": "2026-10-19T08:30:00.000Z", "urgent": false}
//! ```
//!
//! ## Response
//!
//! | Status | Body | Outcome |
//! |--------|------|---------|
//! | any | `error` contains "no active shift" (any case) | session invalidated |
//! | 2xx | anything else | accepted |
//! | other | anything else | transient, retried |

use std::future::Future;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use warden_monitor::Heartbeat;

use crate::error::DeliveryError;

/// Marker the collector uses when the shift behind the token has ended.
const NO_ACTIVE_SHIFT: &str = "no active shift";

/// Remote endpoint that accepts heartbeats.
///
/// Implementations perform one attempt per call; retrying is the
/// session's job.
pub trait Collector: Send + Sync + 'static {
    /// Delivers one heartbeat.
    fn deliver(
        &self,
        heartbeat: &Heartbeat,
    ) -> impl Future<Output = std::result::Result<(), DeliveryError>> + Send;
}

/// JSON body of a heartbeat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Latitude of the reported fix.
    pub latitude: f64,
    /// Longitude of the reported fix.
    pub longitude: f64,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    /// Whether the heartbeat reports a boundary crossing.
    pub urgent: bool,
}

impl From<&Heartbeat> for HeartbeatPayload {
    fn from(heartbeat: &Heartbeat) -> Self {
        Self {
            latitude: heartbeat.position.latitude,
            longitude: heartbeat.position.longitude,
            timestamp: heartbeat
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            urgent: heartbeat.urgent,
        }
    }
}

/// Body shape returned by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectorResponse {
    /// Present on success responses.
    #[serde(default)]
    pub success: Option<bool>,
    /// Error description on failures.
    #[serde(default)]
    pub error: Option<String>,
    /// Informational message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Maps a collector status and body to a delivery outcome.
///
/// The "no active shift" check runs before the status check: the
/// collector may report it with any status code.
///
/// # Example
///
/// ```rust
/// use warden_transport::{classify_response, DeliveryError};
///
/// assert!(classify_response(200, r#"{"success": true}"#).is_ok());
/// assert!(matches!(
///     classify_response(400, r#"{"error": "No active shift found"}"#),
///     Err(DeliveryError::SessionInvalidated(_))
/// ));
/// assert!(matches!(
///     classify_response(502, "bad gateway"),
///     Err(DeliveryError::Rejected { status: 502, .. })
/// ));
/// ```
pub fn classify_response(status: u16, body: &str) -> std::result::Result<(), DeliveryError> {
    let response: CollectorResponse = serde_json::from_str(body).unwrap_or_default();

    if let Some(error) = &response.error {
        if error.to_lowercase().contains(NO_ACTIVE_SHIFT) {
            return Err(DeliveryError::SessionInvalidated(error.clone()));
        }
    }

    if (200..300).contains(&status) {
        return Ok(());
    }

    Err(DeliveryError::Rejected {
        status,
        message: response.error.or(response.message),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use warden_geofence::Position;

    #[test]
    fn test_payload_shape() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap();
        let heartbeat = Heartbeat {
            position: Position::new(40.0, -74.0, 5.0, at),
            timestamp: at,
            urgent: true,
        };
        let json = serde_json::to_value(HeartbeatPayload::from(&heartbeat)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "latitude": 40.0,
                "longitude": -74.0,
                "timestamp": "2026-10-19T08:30:00.000Z",
                "urgent": true
            })
        );
    }

    #[test]
    fn test_success_statuses() {
        assert!(classify_response(200, "").is_ok());
        assert!(classify_response(204, "").is_ok());
        assert!(classify_response(200, r#"{"success": true, "message": "Location updated"}"#).is_ok());
    }

    #[test]
    fn test_no_active_shift_any_case_any_status() {
        for status in [200, 400, 409, 500] {
            for text in ["No active shift", "NO ACTIVE SHIFT for user", "error: no Active Shift"] {
                let body = serde_json::json!({ "success": false, "error": text }).to_string();
                assert!(
                    classify_response(status, &body)
                        .unwrap_err()
                        .is_session_invalidated(),
                    "{status} {text}"
                );
            }
        }
    }

    #[test]
    fn test_marker_outside_error_field_is_ignored() {
        let body = r#"{"message": "No active shift"}"#;
        assert_eq!(
            classify_response(500, body),
            Err(DeliveryError::Rejected {
                status: 500,
                message: Some("No active shift".to_string()),
            })
        );
        assert!(classify_response(200, body).is_ok());
    }

    #[test]
    fn test_other_failures_are_transient() {
        let err = classify_response(400, r#"{"success": false, "error": "Invalid coordinates"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected {
                status: 400,
                message: Some("Invalid coordinates".to_string()),
            }
        );
        assert!(!classify_response(503, "<html>").unwrap_err().is_session_invalidated());
    }
}
