//! # Heartbeat Outbox
//!
//! Delivery bookkeeping for heartbeats: a single-slot mailbox, the retry
//! counter, the backoff deadline and the time of the last successful sync.
//!
//! The outbox performs no I/O. The session asks it what to send
//! ([`HeartbeatOutbox::dispatch`]), performs the request, and reports back
//! with [`HeartbeatOutbox::delivered`] or [`HeartbeatOutbox::failed`].
//!
//! ## Invariants
//!
//! - The mailbox holds at most one heartbeat; a newer one replaces it.
//! - At most one delivery is in flight.
//! - While backing off, only an urgent heartbeat triggers an early attempt.
//! - The network-error threshold is reported once per outage; any success
//!   starts a new outage count.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::heartbeat::Heartbeat;

/// Single-slot, last-write-wins mailbox.
///
/// # Example
///
/// ```rust
/// use warden_monitor::Mailbox;
///
/// let mut slot = Mailbox::new();
/// assert_eq!(slot.put(1), None);
/// assert_eq!(slot.put(2), Some(1));
/// assert_eq!(slot.len(), 1);
/// assert_eq!(slot.take(), Some(2));
/// assert!(slot.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox<T> {
    slot: Option<T>,
}

impl<T> Mailbox<T> {
    /// Creates an empty mailbox.
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Stores `item`, returning the item it displaced.
    pub fn put(&mut self, item: T) -> Option<T> {
        self.slot.replace(item)
    }

    /// Stores `item` only if the mailbox is empty.
    ///
    /// Returns the item back when the slot was occupied.
    pub fn put_if_empty(&mut self, item: T) -> Option<T> {
        if self.slot.is_some() {
            return Some(item);
        }
        self.slot = Some(item);
        None
    }

    /// Removes and returns the stored item.
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    /// Borrows the stored item.
    #[must_use]
    pub const fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    /// Mutably borrows the stored item.
    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.slot.as_mut()
    }

    /// 0 or 1.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.slot.is_some() {
            1
        } else {
            0
        }
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Drops the stored item.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Consecutive-failure counter and the delay it implies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    /// Consecutive failed deliveries since the last success.
    pub attempt_count: u32,
    /// Delay before the next attempt, in milliseconds.
    pub next_delay_ms: u64,
}

/// What the session must do after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Backoff before the next attempt.
    pub delay: Duration,
    /// Consecutive failures so far.
    pub attempt_count: u32,
    /// True exactly when this failure reached the retry threshold.
    pub threshold_reached: bool,
}

/// Delivery state for one monitoring session.
#[derive(Debug)]
pub struct HeartbeatOutbox {
    policy: RetryPolicy,
    pending: Mailbox<Heartbeat>,
    in_flight: bool,
    retry: RetryState,
    retry_at: Option<Instant>,
    last_server_sync: Option<Instant>,
    delivered: u64,
}

impl HeartbeatOutbox {
    /// Creates an empty outbox.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: Mailbox::new(),
            in_flight: false,
            retry: RetryState {
                attempt_count: 0,
                next_delay_ms: 0,
            },
            retry_at: None,
            last_server_sync: None,
            delivered: 0,
        }
    }

    /// Places a heartbeat in the mailbox, replacing any undelivered one.
    ///
    /// Urgency is sticky: if the displaced heartbeat reported a crossing,
    /// its replacement is marked urgent too. An urgent heartbeat also
    /// cancels a pending backoff so it is attempted immediately.
    pub fn enqueue(&mut self, mut heartbeat: Heartbeat) {
        if let Some(displaced) = self.pending.peek() {
            heartbeat.urgent |= displaced.urgent;
            debug!("coalescing undelivered heartbeat");
        }
        if heartbeat.urgent && self.retry_at.take().is_some() {
            debug!("urgent heartbeat cuts backoff short");
        }
        self.pending.put(heartbeat);
    }

    /// Takes the heartbeat to send now, if a send is allowed.
    ///
    /// A send is allowed when nothing is in flight, the mailbox is
    /// non-empty, and any backoff deadline has passed.
    pub fn dispatch(&mut self, now: Instant) -> Option<Heartbeat> {
        if self.in_flight {
            return None;
        }
        if matches!(self.retry_at, Some(at) if at > now) {
            return None;
        }
        let heartbeat = self.pending.take()?;
        self.retry_at = None;
        self.in_flight = true;
        Some(heartbeat)
    }

    /// Records a successful delivery.
    pub fn delivered(&mut self, now: Instant) {
        self.in_flight = false;
        self.retry = RetryState::default();
        self.retry_at = None;
        self.last_server_sync = Some(now);
        self.delivered += 1;
    }

    /// Records a failed delivery of `heartbeat` and schedules the retry.
    ///
    /// The failed heartbeat goes back into the mailbox unless a newer one
    /// arrived while it was in flight.
    pub fn failed(&mut self, heartbeat: Heartbeat, now: Instant) -> FailureOutcome {
        self.in_flight = false;
        if let Some(failed) = self.pending.put_if_empty(heartbeat) {
            if let Some(newer) = self.pending.peek_mut() {
                newer.urgent |= failed.urgent;
            }
        }

        self.retry.attempt_count = self.retry.attempt_count.saturating_add(1);
        let delay = self.policy.delay_for_attempt(self.retry.attempt_count);
        self.retry.next_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.retry_at = Some(now + delay);

        let threshold_reached = self.retry.attempt_count == self.policy.max_retries;
        if threshold_reached {
            warn!(
                attempts = self.retry.attempt_count,
                "heartbeat delivery keeps failing"
            );
        }

        FailureOutcome {
            delay,
            attempt_count: self.retry.attempt_count,
            threshold_reached,
        }
    }

    /// Deadline of the scheduled retry, if backing off.
    #[inline]
    #[must_use]
    pub const fn retry_deadline(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Time of the last successful delivery.
    #[inline]
    #[must_use]
    pub const fn last_server_sync(&self) -> Option<Instant> {
        self.last_server_sync
    }

    /// Current retry counters.
    #[inline]
    #[must_use]
    pub const fn retry_state(&self) -> RetryState {
        self.retry
    }

    /// Returns true while a delivery is outstanding.
    #[inline]
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of undelivered heartbeats waiting (0 or 1).
    #[inline]
    #[must_use]
    pub const fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The waiting heartbeat, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&Heartbeat> {
        self.pending.peek()
    }

    /// Total successful deliveries.
    #[inline]
    #[must_use]
    pub const fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Discards everything: mailbox, retry state, backoff and sync time.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.in_flight = false;
        self.retry = RetryState::default();
        self.retry_at = None;
        self.last_server_sync = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_geofence::Position;

    fn periodic(lat: f64) -> Heartbeat {
        Heartbeat::periodic(Position::now(lat, -74.0, 5.0))
    }

    fn urgent(lat: f64) -> Heartbeat {
        Heartbeat::urgent(Position::now(lat, -74.0, 5.0))
    }

    #[test]
    fn test_mailbox_never_exceeds_one() {
        let mut slot = Mailbox::new();
        for i in 0..10 {
            slot.put(i);
            assert_eq!(slot.len(), 1);
        }
        assert_eq!(slot.take(), Some(9));
    }

    #[test]
    fn test_put_if_empty() {
        let mut slot = Mailbox::new();
        assert_eq!(slot.put_if_empty("a"), None);
        assert_eq!(slot.put_if_empty("b"), Some("b"));
        assert_eq!(slot.peek(), Some(&"a"));
    }

    #[test]
    fn test_dispatch_takes_pending() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        assert!(outbox.dispatch(now).is_none());

        outbox.enqueue(periodic(40.0));
        let hb = outbox.dispatch(now).unwrap();
        assert!((hb.position.latitude - 40.0).abs() < f64::EPSILON);
        assert!(outbox.is_in_flight());
        assert_eq!(outbox.pending_len(), 0);
    }

    #[test]
    fn test_one_in_flight_and_coalescing() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(periodic(40.0));
        outbox.dispatch(now).unwrap();

        outbox.enqueue(periodic(40.1));
        outbox.enqueue(periodic(40.2));
        assert_eq!(outbox.pending_len(), 1);
        assert!(outbox.dispatch(now).is_none(), "still in flight");

        outbox.delivered(now);
        let next = outbox.dispatch(now).unwrap();
        assert!((next.position.latitude - 40.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_success_resets_retry_and_records_sync() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(periodic(40.0));
        let hb = outbox.dispatch(now).unwrap();
        outbox.failed(hb, now);
        assert_eq!(outbox.retry_state().attempt_count, 1);

        let later = now + Duration::from_secs(2);
        outbox.dispatch(later).unwrap();
        outbox.delivered(later);
        assert_eq!(outbox.retry_state(), RetryState::default());
        assert_eq!(outbox.last_server_sync(), Some(later));
        assert_eq!(outbox.delivered_count(), 1);
    }

    #[test]
    fn test_failure_requeues_and_backs_off() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(periodic(40.0));
        let hb = outbox.dispatch(now).unwrap();

        let outcome = outbox.failed(hb, now);
        assert_eq!(outcome.delay, Duration::from_millis(2_000));
        assert_eq!(outbox.retry_state().next_delay_ms, 2_000);
        assert_eq!(outbox.pending_len(), 1);
        assert_eq!(outbox.retry_deadline(), Some(now + Duration::from_millis(2_000)));

        assert!(outbox.dispatch(now + Duration::from_millis(1_999)).is_none());
        assert!(outbox.dispatch(now + Duration::from_millis(2_000)).is_some());
    }

    #[test]
    fn test_failure_keeps_newer_heartbeat() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(urgent(40.0));
        let hb = outbox.dispatch(now).unwrap();
        outbox.enqueue(periodic(40.5));

        outbox.failed(hb, now);
        let waiting = outbox.pending().unwrap();
        assert!((waiting.position.latitude - 40.5).abs() < f64::EPSILON);
        assert!(waiting.urgent, "crossing report must not be downgraded");
    }

    #[test]
    fn test_urgent_cuts_backoff() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(periodic(40.0));
        let hb = outbox.dispatch(now).unwrap();
        outbox.failed(hb, now);

        outbox.enqueue(periodic(40.1));
        assert!(outbox.dispatch(now).is_none(), "periodic waits for backoff");

        outbox.enqueue(urgent(40.2));
        let hb = outbox.dispatch(now).unwrap();
        assert!(hb.urgent);
    }

    #[test]
    fn test_threshold_reached_once() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let mut now = Instant::now();
        outbox.enqueue(periodic(40.0));

        let mut crossings = Vec::new();
        for _ in 0..7 {
            let hb = outbox.dispatch(now).unwrap();
            let outcome = outbox.failed(hb, now);
            crossings.push(outcome.threshold_reached);
            now += outcome.delay;
        }
        assert_eq!(
            crossings,
            vec![false, false, false, false, true, false, false]
        );
        assert_eq!(outbox.retry_state().next_delay_ms, 60_000);
    }

    #[test]
    fn test_threshold_rearms_after_success() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let mut now = Instant::now();
        outbox.enqueue(periodic(40.0));

        for _ in 0..5 {
            let hb = outbox.dispatch(now).unwrap();
            now += outbox.failed(hb, now).delay;
        }
        outbox.dispatch(now).unwrap();
        outbox.delivered(now);

        outbox.enqueue(periodic(40.0));
        let mut reached = 0;
        for _ in 0..5 {
            let hb = outbox.dispatch(now).unwrap();
            let outcome = outbox.failed(hb, now);
            if outcome.threshold_reached {
                reached += 1;
            }
            now += outcome.delay;
        }
        assert_eq!(reached, 1);
    }

    #[test]
    fn test_clear() {
        let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
        let now = Instant::now();
        outbox.enqueue(periodic(40.0));
        let hb = outbox.dispatch(now).unwrap();
        outbox.failed(hb, now);

        outbox.clear();
        assert_eq!(outbox.pending_len(), 0);
        assert!(!outbox.is_in_flight());
        assert!(outbox.retry_deadline().is_none());
        assert_eq!(outbox.retry_state(), RetryState::default());
        assert!(outbox.last_server_sync().is_none());
    }
}
