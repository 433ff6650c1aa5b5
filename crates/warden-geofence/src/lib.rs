//! # Warden Geofence - Work Area Evaluation
//!
//! The geofence crate is the leaf of the Shift Warden pipeline. It answers a
//! single question for every accepted position sample: how far is the device
//! from the centre of its assigned work area, and is that inside the radius?
//!
//! ## Model
//!
//! A work area is a circle on a spherical Earth (radius 6,371,000 m).
//! Distances are great-circle distances computed with the haversine formula.
//!
//! | Type | Role |
//! |------|------|
//! | [`WorkAreaConfig`] | Circle centre + radius, validated at construction |
//! | [`Position`] | One immutable device fix with reported accuracy |
//! | [`Evaluation`] | Distance from centre and the in/out verdict |
//!
//! ## Boundary Semantics
//!
//! The radius is inclusive: a device exactly on the circle is in range.
//!
//! ## Usage
//!
//! ```rust
//! use warden_geofence::{evaluate, Position, WorkAreaConfig};
//!
//! let area = WorkAreaConfig::new(40.0, -74.0, 50.0)?;
//! let fix = Position::now(40.0001, -74.0, 8.0);
//!
//! let verdict = evaluate(&area, &fix);
//! assert!(verdict.in_range);
//! # Ok::<(), warden_geofence::GeofenceError>(())
//! ```

mod evaluator;
mod models;

pub use evaluator::{evaluate, haversine_meters, project, Evaluation, EARTH_RADIUS_METERS};
pub use models::{GeofenceError, Position, WorkAreaConfig};

/// Result type alias for geofence operations.
pub type Result<T> = std::result::Result<T, GeofenceError>;
