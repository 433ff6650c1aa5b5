//! # Compliance State Machine
//!
//! Consumes accepted position fixes, evaluates them against the work area,
//! and decides what the session must do next.
//!
//! ## Transitions
//!
//! | Current | Verdict | Next | Event |
//! |---------|---------|------|-------|
//! | Compliant | in range | Compliant | - |
//! | Compliant | out of range | Warning | `ViolationDetected(distance)` |
//! | Warning | in range | Compliant | `ReturnedToCompliance` |
//! | Warning | out of range | Warning | - |
//!
//! A transition always carries an urgent heartbeat and a profile switch
//! (Precise on entering Warning, Relaxed on leaving it). A stable verdict
//! only produces a periodic heartbeat once the state's interval has passed
//! since the last successful delivery.
//!
//! ## Movement Gate
//!
//! Fixes within the movement threshold of the last retained fix are skipped
//! while the periodic deadline is still ahead. Once it has passed, every fix
//! is evaluated and retained again, so a slow drift across the boundary is
//! still reported.
//!
//! The machine never reads a clock. Callers pass `now` and the time of the
//! last successful delivery, which keeps every decision reproducible.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};
use warden_geofence::{evaluate, Evaluation, Position, WorkAreaConfig};

use crate::config::MonitorConfig;
use crate::heartbeat::Heartbeat;
use crate::source::AccuracyProfile;

/// Whether the device is inside its work area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceState {
    /// Inside the work area.
    #[default]
    Compliant,
    /// Outside the work area.
    Warning,
}

impl ComplianceState {
    /// Accuracy profile the feed should use in this state.
    #[inline]
    #[must_use]
    pub const fn profile(self) -> AccuracyProfile {
        match self {
            Self::Compliant => AccuracyProfile::Relaxed,
            Self::Warning => AccuracyProfile::Precise,
        }
    }
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compliant => f.write_str("Compliant"),
            Self::Warning => f.write_str("Warning"),
        }
    }
}

/// Event emitted on a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ComplianceEvent {
    /// Device left the work area.
    ViolationDetected {
        /// Distance from the work-area centre.
        distance_meters: f64,
    },
    /// Device came back inside the work area.
    ReturnedToCompliance,
}

/// Everything the session has to act on after one fix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Geofence result, if the fix was evaluated.
    pub evaluation: Option<Evaluation>,
    /// Transition event, if the state changed.
    pub event: Option<ComplianceEvent>,
    /// Profile the feed must switch to.
    pub profile_change: Option<AccuracyProfile>,
    /// Heartbeat to hand to the outbox.
    pub heartbeat: Option<Heartbeat>,
}

impl Decision {
    /// Returns true if the fix caused a transition.
    #[inline]
    #[must_use]
    pub const fn is_transition(&self) -> bool {
        self.event.is_some()
    }
}

/// The compliance state machine for one monitoring session.
///
/// # Example
///
/// ```rust
/// use tokio::time::Instant;
/// use warden_geofence::{project, Position, WorkAreaConfig};
/// use warden_monitor::{ComplianceState, ComplianceStateMachine, MonitorConfig};
///
/// let area = WorkAreaConfig::new(40.0, -74.0, 50.0)?;
/// let mut machine = ComplianceStateMachine::new(area, MonitorConfig::new());
///
/// let (lat, lon) = project(40.0, -74.0, 0.0, 51.0);
/// let decision = machine.on_position(Position::now(lat, lon, 5.0), Instant::now(), None);
///
/// assert!(decision.is_transition());
/// assert_eq!(machine.state(), ComplianceState::Warning);
/// # Ok::<(), warden_geofence::GeofenceError>(())
/// ```
#[derive(Debug)]
pub struct ComplianceStateMachine {
    work_area: WorkAreaConfig,
    config: MonitorConfig,
    state: ComplianceState,
    last_position: Option<Position>,
    last_evaluation: Option<Evaluation>,
    evaluated: u64,
    skipped: u64,
}

impl ComplianceStateMachine {
    /// Creates a machine in the `Compliant` state.
    #[must_use]
    pub fn new(work_area: WorkAreaConfig, config: MonitorConfig) -> Self {
        Self {
            work_area,
            config,
            state: ComplianceState::Compliant,
            last_position: None,
            last_evaluation: None,
            evaluated: 0,
            skipped: 0,
        }
    }

    /// Current compliance state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ComplianceState {
        self.state
    }

    /// Work area this machine evaluates against.
    #[inline]
    #[must_use]
    pub const fn work_area(&self) -> &WorkAreaConfig {
        &self.work_area
    }

    /// Last fix that was evaluated.
    #[inline]
    #[must_use]
    pub const fn last_position(&self) -> Option<&Position> {
        self.last_position.as_ref()
    }

    /// Result of the last evaluation.
    #[inline]
    #[must_use]
    pub const fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_evaluation.as_ref()
    }

    /// Number of fixes that went through the evaluator.
    #[inline]
    #[must_use]
    pub const fn evaluated_count(&self) -> u64 {
        self.evaluated
    }

    /// Number of fixes skipped by the movement gate.
    #[inline]
    #[must_use]
    pub const fn skipped_count(&self) -> u64 {
        self.skipped
    }

    /// Periodic heartbeat interval for the current state.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        match self.state {
            ComplianceState::Compliant => self.config.compliant_interval(),
            ComplianceState::Warning => self.config.warning_interval(),
        }
    }

    /// Whether a periodic heartbeat is due.
    ///
    /// Never having synced counts as due.
    #[must_use]
    pub fn periodic_due(&self, now: Instant, last_sync: Option<Instant>) -> bool {
        match last_sync {
            None => true,
            Some(at) => now.saturating_duration_since(at) > self.sync_interval(),
        }
    }

    /// Processes one accepted fix.
    pub fn on_position(
        &mut self,
        pos: Position,
        now: Instant,
        last_sync: Option<Instant>,
    ) -> Decision {
        if !self.is_significant(&pos) && !self.periodic_due(now, last_sync) {
            self.skipped += 1;
            return Decision::default();
        }

        let evaluation = evaluate(&self.work_area, &pos);
        self.evaluated += 1;
        self.last_position = Some(pos);
        self.last_evaluation = Some(evaluation);

        let mut decision = Decision {
            evaluation: Some(evaluation),
            ..Decision::default()
        };

        match (self.state, evaluation.in_range) {
            (ComplianceState::Compliant, false) => {
                self.state = ComplianceState::Warning;
                info!(
                    distance = evaluation.distance_meters,
                    radius = self.work_area.radius_meters,
                    "left work area"
                );
                decision.event = Some(ComplianceEvent::ViolationDetected {
                    distance_meters: evaluation.distance_meters,
                });
                decision.profile_change = Some(AccuracyProfile::Precise);
                decision.heartbeat = Some(Heartbeat::urgent(pos));
            }
            (ComplianceState::Warning, true) => {
                self.state = ComplianceState::Compliant;
                info!(distance = evaluation.distance_meters, "returned to work area");
                decision.event = Some(ComplianceEvent::ReturnedToCompliance);
                decision.profile_change = Some(AccuracyProfile::Relaxed);
                decision.heartbeat = Some(Heartbeat::urgent(pos));
            }
            _ => {
                if self.periodic_due(now, last_sync) {
                    decision.heartbeat = Some(Heartbeat::periodic(pos));
                }
            }
        }

        decision
    }

    /// Periodic check between fixes.
    ///
    /// Emits a heartbeat from the last retained fix when the sync deadline
    /// has passed. Returns `None` before the first fix.
    pub fn on_sync_tick(&mut self, now: Instant, last_sync: Option<Instant>) -> Option<Heartbeat> {
        let pos = self.last_position?;
        if self.periodic_due(now, last_sync) {
            debug!(state = %self.state, "periodic sync due without new fix");
            Some(Heartbeat::periodic(pos))
        } else {
            None
        }
    }

    /// Returns the machine to its initial state.
    pub fn reset(&mut self) {
        self.state = ComplianceState::Compliant;
        self.last_position = None;
        self.last_evaluation = None;
        self.evaluated = 0;
        self.skipped = 0;
    }

    fn is_significant(&self, pos: &Position) -> bool {
        match &self.last_position {
            None => true,
            Some(last) => last.distance_to(pos) > self.config.movement_threshold_meters,
        }
    }
}
