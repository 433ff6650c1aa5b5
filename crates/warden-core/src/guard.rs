//! The shift monitor facade.
//!
//! [`ShiftMonitor`] is the only type an embedding application needs. It
//! starts and stops monitoring sessions and exposes read-only views of the
//! current one. All session state lives on the spawned session task.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use warden_geofence::WorkAreaConfig;
use warden_monitor::{ComplianceState, MonitorConfig, PositionSource};
use warden_transport::Collector;

use crate::{
    listener::{ComplianceListener, MonitorStatus},
    session::Session,
    Result,
};

struct ActiveSession {
    id: Uuid,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Client-side shift-location compliance monitor.
///
/// At most one session runs at a time. A session begins with
/// [`start`](Self::start) and ends with [`stop`](Self::stop), or when the
/// collector reports the shift is no longer active.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use warden_core::{ComplianceListener, ShiftMonitor};
/// use warden_geofence::WorkAreaConfig;
/// use warden_monitor::ChannelPositionSource;
/// use warden_transport::{CollectorConfig, HttpCollector};
///
/// struct Quiet;
/// impl ComplianceListener for Quiet {
///     fn on_violation_detected(&self, _: f64) {}
///     fn on_returned_to_compliance(&self) {}
///     fn on_network_error(&self) {}
/// }
///
/// # async fn demo() -> warden_core::Result<()> {
/// let (source, platform) = ChannelPositionSource::new(32);
/// let collector = HttpCollector::new(&CollectorConfig::new("https://api.example.com", "token"))?;
/// let mut monitor = ShiftMonitor::new(source, collector);
///
/// monitor.start(WorkAreaConfig::new(40.0, -74.0, 50.0)?, Arc::new(Quiet))?;
/// // ... platform.push(fix) as fixes arrive ...
/// monitor.stop().await;
/// # drop(platform);
/// # Ok(())
/// # }
/// ```
pub struct ShiftMonitor<S: PositionSource, C: Collector> {
    source: Arc<S>,
    collector: Arc<C>,
    config: MonitorConfig,
    status: Arc<watch::Sender<MonitorStatus>>,
    active: Option<ActiveSession>,
}

impl<S: PositionSource, C: Collector> ShiftMonitor<S, C> {
    /// Creates a monitor with default tuning.
    pub fn new(source: S, collector: C) -> Self {
        Self::build(Arc::new(source), Arc::new(collector), MonitorConfig::default())
    }

    /// Creates a monitor with custom tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn with_config(source: Arc<S>, collector: Arc<C>, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(source, collector, config))
    }

    fn build(source: Arc<S>, collector: Arc<C>, config: MonitorConfig) -> Self {
        let (status, _) = watch::channel(MonitorStatus::stopped());
        Self {
            source,
            collector,
            config,
            status: Arc::new(status),
            active: None,
        }
    }

    /// Begins monitoring `work_area`.
    ///
    /// Does nothing if a session is already running. Must be called from
    /// within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the work area is invalid. No session is started
    /// in that case.
    pub fn start(
        &mut self,
        work_area: WorkAreaConfig,
        listener: Arc<dyn ComplianceListener>,
    ) -> Result<()> {
        self.reap();
        if let Some(active) = &self.active {
            debug!(session = %active.id, "start ignored, session already running");
            return Ok(());
        }
        work_area.validate()?;

        let id = Uuid::new_v4();
        let session = Session::open(
            work_area,
            &self.config,
            Arc::clone(&self.source),
            Arc::clone(&self.collector),
            listener,
            Arc::clone(&self.status),
        );
        let (shutdown, shutdown_rx) = oneshot::channel();
        let span = info_span!("session", id = %id);
        let handle = tokio::spawn(
            async move {
                let end = session.run(shutdown_rx).await;
                debug!(?end, "session task finished");
            }
            .instrument(span),
        );

        info!(
            session = %id,
            lat = work_area.center_latitude,
            lon = work_area.center_longitude,
            radius = work_area.radius_meters,
            "monitoring started"
        );
        self.active = Some(ActiveSession {
            id,
            shutdown,
            handle,
        });
        Ok(())
    }

    /// Ends the current session and waits for it to wind down.
    ///
    /// Safe to call when nothing is running. No listener callback fires
    /// after this returns.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        // Stop the platform watch first so no further fixes are produced.
        self.source.clear_watch();
        let _ = active.shutdown.send(());
        if let Err(err) = active.handle.await {
            warn!(session = %active.id, %err, "session task did not finish cleanly");
            self.status.send_replace(MonitorStatus::stopped());
        }
        info!(session = %active.id, "monitoring stopped");
    }

    /// Whether a session is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.borrow().running
    }

    /// Compliance state of the current session. `Compliant` when idle.
    #[must_use]
    pub fn compliance_state(&self) -> ComplianceState {
        self.status.borrow().state
    }

    /// Latest status snapshot.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    /// Id of the current session, if one is running.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.active
            .as_ref()
            .filter(|active| !active.handle.is_finished())
            .map(|active| active.id)
    }

    /// Monitor tuning.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Forgets a session that ended on its own.
    fn reap(&mut self) {
        let ended = !self.status.borrow().running;
        if self
            .active
            .as_ref()
            .is_some_and(|active| ended || active.handle.is_finished())
        {
            if let Some(active) = self.active.take() {
                debug!(session = %active.id, "reaped finished session");
            }
        }
    }
}

impl<S: PositionSource, C: Collector> Drop for ShiftMonitor<S, C> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
            self.source.clear_watch();
        }
    }
}
