//! # Integration Tests
//!
//! End-to-end tests for the state machine, feed and outbox working
//! together, without a network or a session task.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use warden_geofence::{project, Position, WorkAreaConfig};
use warden_monitor::{
    AccuracyProfile, ChannelPositionSource, ComplianceEvent, ComplianceState,
    ComplianceStateMachine, HeartbeatOutbox, MonitorConfig, PositionFeed, RetryPolicy,
};

fn area() -> WorkAreaConfig {
    WorkAreaConfig::new(40.0, -74.0, 50.0).unwrap()
}

fn fix_at(distance: f64, accuracy: f64) -> Position {
    let (lat, lon) = project(40.0, -74.0, 0.0, distance);
    Position::now(lat, lon, accuracy)
}

// ============================================================================
// Crossing Scenarios
// ============================================================================

#[test]
fn test_out_and_back_produces_exactly_two_events() {
    let config = MonitorConfig::new();
    let mut machine = ComplianceStateMachine::new(area(), config.clone());
    let mut outbox = HeartbeatOutbox::new(config.retry);
    let t0 = Instant::now();

    let track = [10.0, 20.0, 51.0, 60.0, 70.0, 65.0, 40.0, 30.0];
    let mut events = Vec::new();
    let mut urgent_sent = 0;

    for (i, distance) in track.iter().enumerate() {
        let now = t0 + Duration::from_secs(i as u64);
        let decision = machine.on_position(fix_at(*distance, 5.0), now, outbox.last_server_sync());
        if let Some(event) = decision.event {
            events.push(event);
        }
        if let Some(heartbeat) = decision.heartbeat {
            outbox.enqueue(heartbeat);
        }
        if let Some(heartbeat) = outbox.dispatch(now) {
            if heartbeat.urgent {
                urgent_sent += 1;
            }
            outbox.delivered(now);
        }
    }

    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        ComplianceEvent::ViolationDetected { distance_meters } if (distance_meters - 51.0).abs() < 1e-6
    ));
    assert_eq!(events[1], ComplianceEvent::ReturnedToCompliance);
    assert_eq!(urgent_sent, 2);
    assert_eq!(machine.state(), ComplianceState::Compliant);
}

#[test]
fn test_warning_cadence_over_ten_minutes() {
    let config = MonitorConfig::new();
    let mut machine = ComplianceStateMachine::new(area(), config.clone());
    let mut outbox = HeartbeatOutbox::new(config.retry);
    let t0 = Instant::now();

    // Leave the area, then wander outside with a fix every second.
    let mut periodic = 0;
    for second in 0..600u64 {
        let now = t0 + Duration::from_secs(second);
        let distance = 60.0 + (second % 2) as f64 * 10.0;
        let decision = machine.on_position(fix_at(distance, 5.0), now, outbox.last_server_sync());
        if let Some(heartbeat) = decision.heartbeat {
            if !heartbeat.urgent {
                periodic += 1;
            }
            outbox.enqueue(heartbeat);
        }
        if outbox.dispatch(now).is_some() {
            outbox.delivered(now);
        }
    }

    // One every 31 s after the initial urgent report.
    assert_eq!(periodic, 599 / 31);
    assert_eq!(machine.state(), ComplianceState::Warning);
}

// ============================================================================
// Outage Scenarios
// ============================================================================

#[test]
fn test_outage_keeps_single_pending_and_caps_backoff() {
    let config = MonitorConfig::new();
    let mut machine = ComplianceStateMachine::new(area(), config.clone());
    let mut outbox = HeartbeatOutbox::new(RetryPolicy::new());
    let mut now = Instant::now();

    let mut threshold_hits = 0;
    let mut delays = Vec::new();

    for step in 0..40u64 {
        let distance = if step % 2 == 0 { 10.0 } else { 80.0 };
        let decision = machine.on_position(fix_at(distance, 5.0), now, outbox.last_server_sync());
        if let Some(heartbeat) = decision.heartbeat {
            outbox.enqueue(heartbeat);
        }
        assert!(outbox.pending_len() <= 1);

        if let Some(heartbeat) = outbox.dispatch(now) {
            let outcome = outbox.failed(heartbeat, now);
            delays.push(outcome.delay);
            if outcome.threshold_reached {
                threshold_hits += 1;
            }
        }
        now += Duration::from_secs(1);
    }

    assert_eq!(threshold_hits, 1);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(60)));
}

// ============================================================================
// Feed Integration
// ============================================================================

#[tokio::test]
async fn test_noisy_fixes_never_reach_the_machine() {
    let (source, platform) = ChannelPositionSource::new(64);
    let mut feed = PositionFeed::open(Arc::new(source), AccuracyProfile::Relaxed, 100.0);
    let mut machine = ComplianceStateMachine::new(area(), MonitorConfig::new());

    // Far outside, but with terrible accuracy: must be ignored.
    for _ in 0..10 {
        platform.push(fix_at(500.0, 150.0));
    }
    platform.push(fix_at(10.0, 8.0));

    let pos = feed.next().await.unwrap().unwrap();
    machine.on_position(pos, Instant::now(), None);

    assert_eq!(feed.discarded(), 10);
    assert_eq!(machine.evaluated_count(), 1);
    assert_eq!(machine.state(), ComplianceState::Compliant);
}

#[tokio::test]
async fn test_profile_follows_state() {
    let (source, platform) = ChannelPositionSource::new(64);
    let mut feed = PositionFeed::open(Arc::new(source), AccuracyProfile::Relaxed, 100.0);
    let mut machine = ComplianceStateMachine::new(area(), MonitorConfig::new());
    let now = Instant::now();

    for distance in [51.0, 40.0] {
        platform.push(fix_at(distance, 5.0));
        let pos = feed.next().await.unwrap().unwrap();
        let decision = machine.on_position(pos, now, Some(now));
        if let Some(profile) = decision.profile_change {
            feed.switch(profile);
        }
        assert_eq!(platform.active_profile(), Some(machine.state().profile()));
    }

    assert_eq!(platform.watches_opened(), 3);
}
