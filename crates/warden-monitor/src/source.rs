//! # Position Source
//!
//! Abstraction over the platform's continuous location watch.
//!
//! ## Profiles
//!
//! | Profile | High accuracy | Max cached age | Timeout |
//! |---------|---------------|----------------|---------|
//! | [`AccuracyProfile::Relaxed`] | no | 30 s | 15 s |
//! | [`AccuracyProfile::Precise`] | yes | 5 s | 15 s |
//!
//! ## Resubscription
//!
//! Every call to [`PositionSource::watch`] hands back a fresh channel. A
//! [`PositionFeed`] switching profile drops its old receiver, so fixes the
//! platform produced for the previous watch are never delivered.
//!
//! ## Noise Gate
//!
//! [`PositionFeed`] discards fixes whose reported accuracy exceeds the noise
//! ceiling, and fixes whose coordinates are not on the globe, before the
//! state machine ever sees them. Dropped fixes are counted, not reported.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use warden_geofence::Position;

use crate::error::SensorError;

/// Item delivered by a position watch.
pub type PositionEvent = std::result::Result<Position, SensorError>;

/// Accuracy/staleness profile requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccuracyProfile {
    /// Low-power mode used while compliant.
    Relaxed,
    /// High-accuracy mode used while a violation is active.
    Precise,
}

impl AccuracyProfile {
    /// Whether the platform should use its high-accuracy provider.
    #[inline]
    #[must_use]
    pub const fn high_accuracy(self) -> bool {
        matches!(self, Self::Precise)
    }

    /// Oldest cached fix the platform may hand back.
    #[inline]
    #[must_use]
    pub const fn maximum_age(self) -> Duration {
        match self {
            Self::Relaxed => Duration::from_secs(30),
            Self::Precise => Duration::from_secs(5),
        }
    }

    /// How long the platform may take to produce a fix.
    #[inline]
    #[must_use]
    pub const fn timeout(self) -> Duration {
        Duration::from_secs(15)
    }
}

/// Platform location capability.
///
/// Implementations must support exactly one subscriber. Calling
/// [`watch`](Self::watch) again replaces the previous watch.
pub trait PositionSource: Send + Sync + 'static {
    /// Starts a continuous watch with the given profile.
    fn watch(&self, profile: AccuracyProfile) -> mpsc::Receiver<PositionEvent>;

    /// Tears down the current watch, if any. Must be idempotent.
    fn clear_watch(&self);
}

/// Single-consumer view of a [`PositionSource`] with the noise gate applied.
pub struct PositionFeed<S: PositionSource> {
    source: Arc<S>,
    receiver: mpsc::Receiver<PositionEvent>,
    profile: AccuracyProfile,
    noise_ceiling_meters: f64,
    discarded: u64,
}

impl<S: PositionSource> PositionFeed<S> {
    /// Opens a watch on `source` with the given initial profile.
    pub fn open(source: Arc<S>, profile: AccuracyProfile, noise_ceiling_meters: f64) -> Self {
        let receiver = source.watch(profile);
        debug!(?profile, "position watch opened");
        Self {
            source,
            receiver,
            profile,
            noise_ceiling_meters,
            discarded: 0,
        }
    }

    /// Profile of the current watch.
    #[inline]
    #[must_use]
    pub const fn profile(&self) -> AccuracyProfile {
        self.profile
    }

    /// Number of fixes dropped by the noise gate.
    #[inline]
    #[must_use]
    pub const fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Re-establishes the watch with a new profile.
    ///
    /// No-op when the profile is unchanged.
    pub fn switch(&mut self, profile: AccuracyProfile) {
        if profile == self.profile {
            return;
        }
        self.source.clear_watch();
        self.receiver = self.source.watch(profile);
        debug!(from = ?self.profile, to = ?profile, "position watch re-established");
        self.profile = profile;
    }

    /// Next fix or sensor error that passes the noise gate.
    ///
    /// Returns `None` once the platform has closed the watch.
    pub async fn next(&mut self) -> Option<PositionEvent> {
        loop {
            match self.receiver.recv().await? {
                Ok(pos) if !self.accepts(&pos) => {
                    self.discarded += 1;
                    trace!(
                        accuracy = pos.accuracy_meters,
                        ceiling = self.noise_ceiling_meters,
                        "discarding noisy fix"
                    );
                }
                event => return Some(event),
            }
        }
    }

    /// Whether a fix is good enough to evaluate.
    #[must_use]
    pub fn accepts(&self, pos: &Position) -> bool {
        pos.accuracy_meters.is_finite()
            && pos.accuracy_meters <= self.noise_ceiling_meters
            && pos.validate().is_ok()
    }

    /// Tears down the watch. Later calls to [`next`](Self::next) return `None`.
    pub fn release(&mut self) {
        self.source.clear_watch();
        self.receiver.close();
    }

    /// Tears down the watch and drops the feed.
    pub fn close(mut self) {
        self.release();
    }
}

#[derive(Debug, Default)]
struct WatchSlot {
    sender: Option<mpsc::Sender<PositionEvent>>,
    profile: Option<AccuracyProfile>,
    watches_opened: u64,
}

/// In-process [`PositionSource`] fed by a [`PlatformFeed`] handle.
///
/// Used by embedding platforms that receive fixes through their own
/// callbacks, by the CLI track replayer, and by tests.
///
/// # Example
///
/// ```rust
/// use warden_monitor::{AccuracyProfile, ChannelPositionSource, PositionSource};
/// use warden_geofence::Position;
///
/// let (source, platform) = ChannelPositionSource::new(16);
/// let mut rx = source.watch(AccuracyProfile::Relaxed);
///
/// assert_eq!(platform.active_profile(), Some(AccuracyProfile::Relaxed));
/// assert!(platform.push(Position::now(40.0, -74.0, 5.0)));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelPositionSource {
    slot: Arc<Mutex<WatchSlot>>,
    capacity: usize,
}

/// Platform-side handle of a [`ChannelPositionSource`].
#[derive(Debug, Clone)]
pub struct PlatformFeed {
    slot: Arc<Mutex<WatchSlot>>,
}

impl ChannelPositionSource {
    /// Creates a source whose watches buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, PlatformFeed) {
        let slot = Arc::new(Mutex::new(WatchSlot::default()));
        (
            Self {
                slot: Arc::clone(&slot),
                capacity: capacity.max(1),
            },
            PlatformFeed { slot },
        )
    }
}

impl PositionSource for ChannelPositionSource {
    fn watch(&self, profile: AccuracyProfile) -> mpsc::Receiver<PositionEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.sender = Some(tx);
        slot.profile = Some(profile);
        slot.watches_opened += 1;
        rx
    }

    fn clear_watch(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.sender = None;
        slot.profile = None;
    }
}

impl PlatformFeed {
    /// Delivers an event to the current watch.
    ///
    /// Returns `false` when nobody is watching or the watch buffer is full.
    pub fn deliver(&self, event: PositionEvent) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &slot.sender {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Delivers a fix.
    pub fn push(&self, pos: Position) -> bool {
        self.deliver(Ok(pos))
    }

    /// Delivers a sensor error.
    pub fn fail(&self, err: SensorError) -> bool {
        self.deliver(Err(err))
    }

    /// Profile requested by the current watch, if one is open.
    #[must_use]
    pub fn active_profile(&self) -> Option<AccuracyProfile> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).profile
    }

    /// Whether a watch is currently open.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.active_profile().is_some()
    }

    /// Total number of watches opened over the source's lifetime.
    #[must_use]
    pub fn watches_opened(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .watches_opened
    }
}
