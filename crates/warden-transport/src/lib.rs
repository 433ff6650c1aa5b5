//! # Warden Transport
//!
//! Delivers heartbeats to the compliance collector.
//!
//! The [`Collector`] trait is the seam between the session task and the
//! network: one call is one attempt. Retrying, backoff and coalescing live
//! in `warden-monitor`'s outbox; this crate only knows how to speak to the
//! collector and how to read its answers.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`HttpCollector`] | `reqwest` client, bearer auth, 10 s timeout |
//! | [`HeartbeatPayload`] | JSON request body |
//! | [`classify_response`] | Status/body → accepted, transient, or session-ending |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_transport::{Collector, CollectorConfig, HttpCollector};
//! use warden_monitor::Heartbeat;
//! use warden_geofence::Position;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CollectorConfig::new("https://api.example.com", "token");
//! let collector = HttpCollector::new(&config)?;
//!
//! let heartbeat = Heartbeat::periodic(Position::now(40.0, -74.0, 5.0));
//! match collector.deliver(&heartbeat).await {
//!     Ok(()) => println!("accepted"),
//!     Err(e) if e.is_session_invalidated() => println!("shift ended: {e}"),
//!     Err(e) => println!("will retry: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

mod collector;
mod error;
mod http;

pub use collector::{classify_response, Collector, CollectorResponse, HeartbeatPayload};
pub use error::{DeliveryError, Result, TransportError};
pub use http::{CollectorConfig, HttpCollector};
