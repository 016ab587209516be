//! [`DashboardPipeline`] – the single owner of dashboard state.
//!
//! One Tokio task owns the [`TelemetryNormalizer`], the [`CalibrationState`]
//! and the [`EventLogStream`].  Everything that mutates them arrives as a
//! message:
//!
//! | Source | Effect |
//! |---|---|
//! | [`Topic::Telemetry`] | update the current reading slot; apply host offsets |
//! | [`Topic::HostLog`] | append a formatted entry; publish it on [`Topic::Dashboard`] |
//! | any of the above | publish changed [`StatusIndicators`] on [`Topic::Dashboard`] |
//! | [`Topic::Operator`] | calibrate / start sensors on behalf of the cockpit |
//! | [`DashboardHandle`] | the same commands plus read-only queries |
//!
//! Because every mutation happens on that one task, `calibrate()` can never
//! interleave with an axis update.  Renderers never see the mutable state;
//! they read the latest [`OrientationSnapshot`] from a `watch` channel.

use std::sync::Arc;

use ardeidae_core::{CalibrationState, EventLogStream, Reading, TelemetryNormalizer};
use ardeidae_middleware::{EventBus, HostLink, Topic, TopicReceiver};
use ardeidae_types::{
    AddressedMessage, ArdeidaeError, Axis, CalibrationMode, CalibrationSnapshot, Event,
    EventPayload, LogEntry, OperatorCommand, OrientationSnapshot, StatusIndicators,
};
use tokio::sync::{broadcast::error::RecvError, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SOURCE: &str = "ardeidae-runtime::pipeline";

/// Depth of the direct command queue.
const COMMAND_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for [`DashboardPipeline::new`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub calibration_mode: CalibrationMode,
    /// Log substrings that flip the connection flag.
    pub connect_markers: Vec<String>,
    /// Number of log entries returned by [`DashboardHandle::visible_log`].
    pub log_viewport_height: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            calibration_mode: CalibrationMode::Local,
            connect_markers: vec![ardeidae_core::DEFAULT_CONNECT_MARKER.to_string()],
            log_viewport_height: 20,
        }
    }
}

/// The whole event log and the indicators, taken in one step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardSnapshot {
    pub entries: Vec<LogEntry>,
    pub status: StatusIndicators,
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

enum PipelineCommand {
    Calibrate(oneshot::Sender<CalibrationSnapshot>),
    StartSensors(oneshot::Sender<()>),
    Status(oneshot::Sender<StatusIndicators>),
    VisibleLog(oneshot::Sender<Vec<LogEntry>>),
    LogLen(oneshot::Sender<usize>),
    Snapshot(oneshot::Sender<DashboardSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

// ─────────────────────────────────────────────────────────────────────────────
// DashboardPipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Ingestion, calibration and log state, plus the host collaborator.
pub struct DashboardPipeline {
    bus: Arc<EventBus>,
    host: Arc<dyn HostLink>,
    normalizer: TelemetryNormalizer,
    calibration: CalibrationState,
    log: EventLogStream,
    accelerometer_active: bool,
    /// Indicators as last published on [`Topic::Dashboard`].
    last_status: StatusIndicators,
    orientation_tx: watch::Sender<OrientationSnapshot>,
}

impl DashboardPipeline {
    pub fn new(config: PipelineConfig, bus: Arc<EventBus>, host: Arc<dyn HostLink>) -> Self {
        let calibration = CalibrationState::new(config.calibration_mode);
        let mut log = EventLogStream::with_markers(config.connect_markers);
        log.set_viewport_height(config.log_viewport_height);
        let normalizer = TelemetryNormalizer::new();
        let (orientation_tx, _) = watch::channel(calibration.orientation(&normalizer));
        Self {
            bus,
            host,
            normalizer,
            calibration,
            log,
            accelerometer_active: false,
            last_status: StatusIndicators::default(),
            orientation_tx,
        }
    }

    /// Apply one telemetry message and republish the orientation snapshot.
    ///
    /// Unknown addresses change nothing and publish nothing.
    pub fn handle_telemetry(&mut self, message: &AddressedMessage) {
        let Some(reading) = self.normalizer.ingest(message) else {
            return;
        };
        match reading {
            Reading::Angle(Axis::Y, _) => self.accelerometer_active = true,
            Reading::Offset(axis, degrees) => {
                if self.calibration.apply_host_offset(axis, degrees) {
                    debug!(epoch = self.calibration.epoch(), "baseline replaced by host offsets");
                }
            }
            _ => {}
        }
        self.publish_orientation();
        self.publish_status_if_changed();
    }

    /// Append a host log line and publish the entry with fresh indicators.
    pub fn handle_log_line(&mut self, line: &str) -> LogEntry {
        let entry = self.log.append(line).clone();
        let status = self.status();
        self.last_status = status;
        let _ = self.bus.publish_to(
            Topic::Dashboard,
            Event::new(
                SOURCE,
                EventPayload::LogAppended {
                    entry: entry.clone(),
                    status,
                },
            ),
        );
        entry
    }

    /// Capture the current readings as the new baseline.
    ///
    /// In host mode the snapshot is also pushed to the host; a failed push
    /// is logged and the local baseline is kept.
    pub async fn calibrate(&mut self) -> CalibrationSnapshot {
        let snapshot = self.calibration.calibrate(self.normalizer.angles());
        self.publish_orientation();

        if self.calibration.mode() == CalibrationMode::Host {
            if let Err(e) = self.host.set_offset_coordinates(snapshot).await {
                warn!(error = %e, "failed to push calibration to host");
            }
        }
        snapshot
    }

    /// Forward a start request to the host.  Never fails.
    pub async fn start_sensors(&mut self) {
        if !self.host.is_available() {
            debug!("start sensors requested with no host attached");
        }
        if let Err(e) = self.host.start_sensors().await {
            warn!(error = %e, "host rejected start sensors");
        }
        self.publish_status_if_changed();
    }

    pub fn status(&self) -> StatusIndicators {
        StatusIndicators {
            sensors_started: !self.log.is_empty(),
            accelerometer_active: self.accelerometer_active,
            ring_connected: self.log.is_connected(),
            host_available: self.host.is_available(),
        }
    }

    /// Latest orientation snapshot.
    pub fn orientation(&self) -> OrientationSnapshot {
        *self.orientation_tx.borrow()
    }

    pub fn log(&self) -> &EventLogStream {
        &self.log
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            entries: self.log.entries().to_vec(),
            status: self.status(),
        }
    }

    /// Move the pipeline onto its own task.
    ///
    /// Bus subscriptions are taken before this returns, so nothing published
    /// afterwards is missed.
    pub fn spawn(self) -> DashboardHandle {
        let telemetry = self.bus.subscribe_to(Topic::Telemetry);
        let host_log = self.bus.subscribe_to(Topic::HostLog);
        let operator = self.bus.subscribe_to(Topic::Operator);
        let orientation = self.orientation_tx.subscribe();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);

        let join = tokio::spawn(self.run(telemetry, host_log, operator, cmd_rx));
        info!("dashboard pipeline started");

        DashboardHandle {
            cmd_tx,
            orientation,
            join: Arc::new(std::sync::Mutex::new(Some(join))),
        }
    }

    fn publish_orientation(&self) {
        self.orientation_tx
            .send_replace(self.calibration.orientation(&self.normalizer));
    }

    fn publish_status_if_changed(&mut self) {
        let status = self.status();
        if status == self.last_status {
            return;
        }
        self.last_status = status;
        debug!(?status, "status indicators changed");
        let _ = self
            .bus
            .publish_to(Topic::Dashboard, Event::new(SOURCE, EventPayload::StatusChanged(status)));
    }

    async fn run(
        mut self,
        mut telemetry: TopicReceiver,
        mut host_log: TopicReceiver,
        mut operator: TopicReceiver,
        mut commands: mpsc::Receiver<PipelineCommand>,
    ) {
        loop {
            tokio::select! {
                event = telemetry.recv() => match event {
                    Ok(Event { payload: EventPayload::Telemetry(msg), .. }) => self.handle_telemetry(&msg),
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "telemetry subscriber lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = host_log.recv() => match event {
                    Ok(Event { payload: EventPayload::HostLog(line), .. }) => {
                        self.handle_log_line(&line);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "log subscriber lagged"),
                    Err(RecvError::Closed) => break,
                },
                event = operator.recv() => match event {
                    Ok(Event { payload: EventPayload::Operator(cmd), source, .. }) => {
                        debug!(?cmd, %source, "operator command");
                        match cmd {
                            OperatorCommand::Calibrate => {
                                self.calibrate().await;
                            }
                            OperatorCommand::StartSensors => self.start_sensors().await,
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "operator subscriber lagged"),
                    Err(RecvError::Closed) => break,
                },
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
            }
        }
        info!(entries = self.log.len(), "dashboard pipeline stopped");
    }

    /// Returns `false` when the pipeline should stop.
    async fn handle_command(&mut self, cmd: PipelineCommand) -> bool {
        match cmd {
            PipelineCommand::Calibrate(reply) => {
                let snapshot = self.calibrate().await;
                let _ = reply.send(snapshot);
            }
            PipelineCommand::StartSensors(reply) => {
                self.start_sensors().await;
                let _ = reply.send(());
            }
            PipelineCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            PipelineCommand::VisibleLog(reply) => {
                let _ = reply.send(self.log.visible().to_vec());
            }
            PipelineCommand::LogLen(reply) => {
                let _ = reply.send(self.log.len());
            }
            PipelineCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            PipelineCommand::Shutdown(reply) => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DashboardHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Cheap, cloneable handle to a running [`DashboardPipeline`].
#[derive(Clone)]
pub struct DashboardHandle {
    cmd_tx: mpsc::Sender<PipelineCommand>,
    orientation: watch::Receiver<OrientationSnapshot>,
    join: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl DashboardHandle {
    /// Capture the current readings as the calibration baseline.
    pub async fn calibrate(&self) -> Result<CalibrationSnapshot, ArdeidaeError> {
        self.request(PipelineCommand::Calibrate).await
    }

    /// Ask the host to start streaming.
    pub async fn start_sensors(&self) -> Result<(), ArdeidaeError> {
        self.request(PipelineCommand::StartSensors).await
    }

    pub async fn status(&self) -> Result<StatusIndicators, ArdeidaeError> {
        self.request(PipelineCommand::Status).await
    }

    /// Entries inside the auto-following log viewport.
    pub async fn visible_log(&self) -> Result<Vec<LogEntry>, ArdeidaeError> {
        self.request(PipelineCommand::VisibleLog).await
    }

    pub async fn log_len(&self) -> Result<usize, ArdeidaeError> {
        self.request(PipelineCommand::LogLen).await
    }

    /// Every log entry so far plus the current indicators.
    pub async fn snapshot(&self) -> Result<DashboardSnapshot, ArdeidaeError> {
        self.request(PipelineCommand::Snapshot).await
    }

    /// Latest orientation snapshot, without waiting.
    pub fn orientation(&self) -> OrientationSnapshot {
        *self.orientation.borrow()
    }

    /// A receiver that render loops poll for the latest snapshot.
    pub fn subscribe_orientation(&self) -> watch::Receiver<OrientationSnapshot> {
        self.orientation.clone()
    }

    /// Stop the pipeline task and wait for it to finish.
    ///
    /// Calling this on an already stopped pipeline is a no-op.
    pub async fn shutdown(&self) -> Result<(), ArdeidaeError> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(PipelineCommand::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
        let join = self
            .join
            .lock()
            .map_err(|e| ArdeidaeError::Channel(format!("pipeline join lock poisoned: {e}")))?
            .take();
        if let Some(join) = join {
            join.await
                .map_err(|e| ArdeidaeError::Channel(format!("pipeline task failed: {e}")))?;
        }
        Ok(())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PipelineCommand,
    ) -> Result<T, ArdeidaeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| ArdeidaeError::Channel("dashboard pipeline stopped".into()))?;
        rx.await
            .map_err(|_| ArdeidaeError::Channel("dashboard pipeline dropped the request".into()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
