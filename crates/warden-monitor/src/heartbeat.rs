//! Heartbeat snapshots sent to the compliance collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_geofence::Position;

/// One compliance snapshot.
///
/// Urgent heartbeats report a boundary crossing and bypass cadence
/// throttling; periodic ones keep the collector's view fresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Fix the snapshot reports.
    pub position: Position,
    /// When the snapshot was built.
    pub timestamp: DateTime<Utc>,
    /// Whether this reports a state transition.
    pub urgent: bool,
}

impl Heartbeat {
    /// Heartbeat reporting a boundary crossing.
    #[must_use]
    pub fn urgent(position: Position) -> Self {
        Self {
            position,
            timestamp: Utc::now(),
            urgent: true,
        }
    }

    /// Cadence-driven heartbeat.
    #[must_use]
    pub fn periodic(position: Position) -> Self {
        Self {
            position,
            timestamp: Utc::now(),
            urgent: false,
        }
    }
}
