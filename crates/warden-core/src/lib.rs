//! # Shift Warden Core
//!
//! Session guard for client-side shift-location compliance.
//! Ties the geofence evaluator, the compliance state machine, the position
//! feed and the heartbeat transport into one start/stop facade.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SHIFT MONITOR                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   start() / stop()        ┌──────────────────┐                  │
//! │  ───────────────────────► │  Session task    │ ── status ──►    │
//! │                           │  (select! loop)  │    (watch)       │
//! │                           └────────┬─────────┘                  │
//! │         ┌──────────────────────────┼──────────────────┐         │
//! │         ▼                          ▼                  ▼         │
//! │  ┌─────────────┐          ┌──────────────┐    ┌─────────────┐   │
//! │  │  Position   │  fixes   │  Compliance  │ hb │  Heartbeat  │   │
//! │  │    Feed     │ ───────► │ State Machine│ ─► │   Outbox    │   │
//! │  └─────────────┘          └──────┬───────┘    └──────┬──────┘   │
//! │                                  │ events            │ POST     │
//! │                                  ▼                   ▼          │
//! │                          ComplianceListener      Collector      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - At most one session runs per [`ShiftMonitor`]
//! - Fixes, delivery results and timers are handled one at a time
//! - Exactly one callback per compliance transition
//! - At most one heartbeat in flight and at most one waiting
//! - A "no active shift" reply from the collector ends the session

mod config;
mod error;
mod guard;
mod listener;
mod session;

pub use config::{WardenConfig, TOKEN_ENV};
pub use error::WardenError;
pub use guard::ShiftMonitor;
pub use listener::{ComplianceListener, MonitorStatus};

// Re-export component types for convenience
pub use warden_geofence::{Position, WorkAreaConfig};
pub use warden_monitor::{
    AccuracyProfile, ChannelPositionSource, ComplianceState, MonitorConfig, PlatformFeed,
    PositionSource, RetryPolicy, SensorError,
};
pub use warden_transport::{Collector, CollectorConfig, DeliveryError, HttpCollector};

/// Core result type for warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
