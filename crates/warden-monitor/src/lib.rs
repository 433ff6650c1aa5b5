//! # Compliance Monitor
//!
//! The synchronous core of Shift Warden: position feed, compliance state
//! machine and heartbeat outbox. Nothing in this crate performs network
//! I/O or spawns tasks; `warden-core` drives these pieces from a single
//! session task.
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`PositionFeed`] | Single-subscriber watch with the 100 m noise gate |
//! | [`ComplianceStateMachine`] | Compliant/Warning transitions and cadence |
//! | [`HeartbeatOutbox`] | Single-slot mailbox, retry counter, backoff |
//! | [`ChannelPositionSource`] | In-process source fed by the platform |
//!
//! ## Flow
//!
//! ```text
//! PositionSource ──► PositionFeed ──► ComplianceStateMachine ──► HeartbeatOutbox
//!        ▲              (noise gate)      (transitions, cadence)     (mailbox, backoff)
//!        └──────── profile switch (Relaxed ⇄ Precise) ◄──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tokio::time::Instant;
//! use warden_geofence::{Position, WorkAreaConfig};
//! use warden_monitor::{ComplianceStateMachine, HeartbeatOutbox, MonitorConfig};
//!
//! let config = MonitorConfig::new();
//! let area = WorkAreaConfig::new(40.0, -74.0, 50.0)?;
//! let mut machine = ComplianceStateMachine::new(area, config.clone());
//! let mut outbox = HeartbeatOutbox::new(config.retry);
//!
//! let now = Instant::now();
//! let decision = machine.on_position(Position::now(40.0, -74.0, 5.0), now, outbox.last_server_sync());
//! if let Some(heartbeat) = decision.heartbeat {
//!     outbox.enqueue(heartbeat);
//! }
//! assert!(outbox.dispatch(now).is_some());
//! # Ok::<(), warden_geofence::GeofenceError>(())
//! ```

mod config;
mod error;
mod heartbeat;
mod machine;
mod outbox;
mod source;

pub use config::{MonitorConfig, RetryPolicy};
pub use error::{MonitorError, Result, SensorError};
pub use heartbeat::Heartbeat;
pub use machine::{ComplianceEvent, ComplianceState, ComplianceStateMachine, Decision};
pub use outbox::{FailureOutcome, HeartbeatOutbox, Mailbox, RetryState};
pub use source::{
    AccuracyProfile, ChannelPositionSource, PlatformFeed, PositionEvent, PositionFeed,
    PositionSource,
};
