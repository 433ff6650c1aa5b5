//! The per-shift session task.
//!
//! One [`Session`] exists per successful `start()`. It owns every piece of
//! mutable monitor state and is driven by a single `tokio::select!` loop, so
//! fixes, delivery completions, retry timers and the sync tick are handled
//! strictly one at a time:
//!
//! ```text
//!             ┌──────────── shutdown (stop) ────────────┐
//!             │                                         ▼
//!  feed ──► on_position ──► outbox ──► in-flight ──► on_delivery ──► end?
//!             ▲                 ▲          delivery         │
//!  tick ──────┘   retry timer ──┘                           └── no active shift
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use warden_geofence::{Position, WorkAreaConfig};
use warden_monitor::{
    ComplianceEvent, ComplianceStateMachine, Heartbeat, HeartbeatOutbox, MonitorConfig,
    PositionEvent, PositionFeed, PositionSource,
};
use warden_transport::{Collector, DeliveryError};

use crate::listener::{ComplianceListener, MonitorStatus};

type DeliveryFuture = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send>>;

struct InFlight {
    heartbeat: Heartbeat,
    delivery: DeliveryFuture,
}

/// Why a session loop exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// `stop()` was called.
    Stopped,
    /// The collector reported there is no active shift.
    Invalidated(String),
}

pub(crate) struct Session<S: PositionSource, C: Collector> {
    machine: ComplianceStateMachine,
    outbox: HeartbeatOutbox,
    feed: PositionFeed<S>,
    feed_open: bool,
    sync_tick: Duration,
    collector: Arc<C>,
    listener: Arc<dyn ComplianceListener>,
    status: Arc<watch::Sender<MonitorStatus>>,
    in_flight: Option<InFlight>,
}

impl<S: PositionSource, C: Collector> Session<S, C> {
    /// Builds a session and opens its position watch in Relaxed mode.
    pub(crate) fn open(
        work_area: WorkAreaConfig,
        config: &MonitorConfig,
        source: Arc<S>,
        collector: Arc<C>,
        listener: Arc<dyn ComplianceListener>,
        status: Arc<watch::Sender<MonitorStatus>>,
    ) -> Self {
        let machine = ComplianceStateMachine::new(work_area, config.clone());
        let feed = PositionFeed::open(
            source,
            machine.state().profile(),
            config.noise_ceiling_meters,
        );
        let session = Self {
            machine,
            outbox: HeartbeatOutbox::new(config.retry),
            feed,
            feed_open: true,
            sync_tick: config.sync_tick(),
            collector,
            listener,
            status,
            in_flight: None,
        };
        session.publish(true);
        session
    }

    /// Runs until stopped or invalidated, then tears the session down.
    pub(crate) async fn run(mut self, shutdown: oneshot::Receiver<()>) -> SessionEnd {
        let end = self.drive(shutdown).await;
        self.teardown(&end);
        end
    }

    async fn drive(&mut self, mut shutdown: oneshot::Receiver<()>) -> SessionEnd {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.sync_tick, self.sync_tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => return SessionEnd::Stopped,

                outcome = poll_delivery(&mut self.in_flight), if self.in_flight.is_some() => {
                    if let Some(end) = self.on_delivery(outcome) {
                        return end;
                    }
                }

                _ = sleep_until(self.outbox.retry_deadline()), if self.outbox.retry_deadline().is_some() => {
                    debug!("retry backoff elapsed");
                    self.pump(Instant::now());
                }

                event = self.feed.next(), if self.feed_open => self.on_event(event),

                _ = ticker.tick() => self.on_tick(),
            }
        }
    }

    fn on_event(&mut self, event: Option<PositionEvent>) {
        match event {
            Some(Ok(pos)) => self.on_position(pos),
            Some(Err(err)) => {
                warn!(%err, "position source error");
                self.listener.on_sensor_error(&err);
            }
            None => {
                warn!("position watch closed by platform");
                self.feed_open = false;
            }
        }
    }

    fn on_position(&mut self, pos: Position) {
        let now = Instant::now();
        let decision = self
            .machine
            .on_position(pos, now, self.outbox.last_server_sync());

        if let Some(profile) = decision.profile_change {
            self.feed.switch(profile);
        }
        match decision.event {
            Some(ComplianceEvent::ViolationDetected { distance_meters }) => {
                self.listener.on_violation_detected(distance_meters);
            }
            Some(ComplianceEvent::ReturnedToCompliance) => {
                self.listener.on_returned_to_compliance();
            }
            None => {}
        }
        if let Some(heartbeat) = decision.heartbeat {
            self.outbox.enqueue(heartbeat);
            self.pump(now);
        }
        self.publish(true);
    }

    fn on_tick(&mut self) {
        // A heartbeat is already on its way.
        if self.in_flight.is_some() || self.outbox.pending_len() > 0 {
            return;
        }
        let now = Instant::now();
        if let Some(heartbeat) = self
            .machine
            .on_sync_tick(now, self.outbox.last_server_sync())
        {
            self.outbox.enqueue(heartbeat);
            self.pump(now);
            self.publish(true);
        }
    }

    fn on_delivery(&mut self, outcome: Result<(), DeliveryError>) -> Option<SessionEnd> {
        let done = self.in_flight.take()?;
        let now = Instant::now();

        match outcome {
            Ok(()) => {
                debug!(urgent = done.heartbeat.urgent, "heartbeat delivered");
                self.outbox.delivered(now);
                self.pump(now);
            }
            Err(DeliveryError::SessionInvalidated(reason)) => {
                warn!(%reason, "collector ended the session");
                return Some(SessionEnd::Invalidated(reason));
            }
            Err(err) => {
                let failure = self.outbox.failed(done.heartbeat, now);
                warn!(
                    %err,
                    attempt = failure.attempt_count,
                    retry_in_ms = failure.delay.as_millis() as u64,
                    "heartbeat delivery failed"
                );
                if failure.threshold_reached {
                    self.listener.on_network_error();
                }
            }
        }

        self.publish(true);
        None
    }

    /// Starts a delivery if the outbox allows one.
    fn pump(&mut self, now: Instant) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(heartbeat) = self.outbox.dispatch(now) else {
            return;
        };
        let collector = Arc::clone(&self.collector);
        debug!(urgent = heartbeat.urgent, "sending heartbeat");
        self.in_flight = Some(InFlight {
            heartbeat,
            delivery: Box::pin(async move { collector.deliver(&heartbeat).await }),
        });
    }

    fn teardown(&mut self, end: &SessionEnd) {
        self.in_flight = None;
        self.outbox.clear();
        self.machine.reset();
        self.feed.release();
        self.feed_open = false;
        self.publish(false);

        match end {
            SessionEnd::Stopped => info!("session stopped"),
            SessionEnd::Invalidated(reason) => {
                info!(%reason, "session invalidated");
                self.listener.on_session_ended(reason);
            }
        }
    }

    fn publish(&self, running: bool) {
        let status = if running {
            MonitorStatus {
                running,
                state: self.machine.state(),
                profile: self.feed.profile(),
                last_distance_meters: self.machine.last_evaluation().map(|e| e.distance_meters),
                failed_attempts: self.outbox.retry_state().attempt_count,
                pending_heartbeats: self.outbox.pending_len(),
                delivered_heartbeats: self.outbox.delivered_count(),
            }
        } else {
            MonitorStatus::stopped()
        };
        self.status.send_replace(status);
    }
}

async fn poll_delivery(in_flight: &mut Option<InFlight>) -> Result<(), DeliveryError> {
    match in_flight {
        Some(flight) => (&mut flight.delivery).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
