//! Render Loop Scheduler.
//!
//! Each scene view runs its own frame task, started by [`spawn_view`] and
//! bound to the returned [`ViewHandle`].  On every tick the task:
//!
//! 1. adds the constant auto-rotation (when enabled),
//! 2. copies the latest orientation into the scene transform, axis by axis,
//!    once the view's content has loaded,
//! 3. hands the frame to the [`SceneView`].
//!
//! The task never waits for telemetry.  It reads whatever
//! [`OrientationSnapshot`] is current in the `watch` channel, so render
//! cadence and telemetry cadence are independent.  An axis with no value
//! keeps its previous rotation.
//!
//! The loop ends when [`ViewHandle::stop`] is called or every handle has
//! been dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ardeidae_middleware::{EventBus, Topic};
use ardeidae_types::{ArdeidaeError, Axis, Event, EventPayload, OrientationSnapshot, Rotation, ViewFrame};
use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Frames per second used when none is configured.
pub const DEFAULT_FRAME_RATE: u32 = 60;
/// Radians added to the Y rotation per frame when auto-rotation is on.
pub const AUTO_ROTATE_STEP: f64 = 0.02;
pub const FIELD_OF_VIEW_DEG: f64 = 45.0;
pub const NEAR_PLANE: f64 = 0.1;
pub const FAR_PLANE: f64 = 1000.0;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

// ─────────────────────────────────────────────────────────────────────────────
// View configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Static description of one scene view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub name: String,
    /// Scene content to load before orientation is applied.
    pub model_path: PathBuf,
    pub camera_z: f64,
    pub wireframe: bool,
    /// Re-centre the model on its bounding box after loading.
    pub center_model: bool,
    pub auto_rotate: bool,
    /// `true`: drive the transform with calibrated offsets.
    /// `false`: drive it with the raw readings.
    pub apply_calibration: bool,
    pub width: u32,
    pub height: u32,
}

impl ViewConfig {
    /// Wireframe hand model following the calibrated orientation.
    pub fn hand(assets: impl Into<PathBuf>) -> Self {
        Self {
            name: "hand".into(),
            model_path: assets.into().join("handLowpoly.glb"),
            camera_z: 2.0,
            wireframe: true,
            center_model: true,
            auto_rotate: false,
            apply_calibration: true,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// Sensor model following the raw readings.
    pub fn sensor(assets: impl Into<PathBuf>) -> Self {
        Self {
            name: "sensor".into(),
            model_path: assets.into().join("lissajous.glb"),
            camera_z: 20.0,
            wireframe: false,
            center_model: false,
            auto_rotate: false,
            apply_calibration: false,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// The two views shown by the dashboard.
    pub fn defaults(assets: impl Into<PathBuf>) -> Vec<Self> {
        let assets = assets.into();
        vec![Self::hand(assets.clone()), Self::sensor(assets)]
    }
}

/// `width / height`, with a zero height treated as one.
pub fn aspect_ratio(width: u32, height: u32) -> f64 {
    f64::from(width) / f64::from(height.max(1))
}

/// Perspective camera parameters of a view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
    pub position_z: f64,
    pub aspect: f64,
}

impl Camera {
    pub fn new(position_z: f64, width: u32, height: u32) -> Self {
        Self {
            fov_deg: FIELD_OF_VIEW_DEG,
            near: NEAR_PLANE,
            far: FAR_PLANE,
            position_z,
            aspect: aspect_ratio(width, height),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene output
// ─────────────────────────────────────────────────────────────────────────────

/// Output surface of a view.
#[async_trait]
pub trait SceneView: Send + 'static {
    /// Load the view's scene content.  Runs on the view's task before the
    /// first frame, so it must not block the executor.
    ///
    /// A failure is logged by the loop, which keeps running without the
    /// content (auto-rotation still applies; orientation does not).
    async fn load_content(&mut self, config: &ViewConfig) -> Result<(), ArdeidaeError>;

    /// Present one frame.
    fn present(&mut self, frame: &ViewFrame, camera: &Camera) -> Result<(), ArdeidaeError>;
}

/// Headless view that publishes every frame on [`Topic::Frames`].
pub struct BusSceneView {
    bus: Arc<EventBus>,
    source: String,
}

impl BusSceneView {
    pub fn new(bus: Arc<EventBus>, view_name: &str) -> Self {
        Self {
            bus,
            source: format!("ardeidae-runtime::render_loop::{view_name}"),
        }
    }
}

#[async_trait]
impl SceneView for BusSceneView {
    async fn load_content(&mut self, config: &ViewConfig) -> Result<(), ArdeidaeError> {
        let meta = tokio::fs::metadata(&config.model_path).await.map_err(|e| {
            ArdeidaeError::AssetLoad(format!("{}: {e}", config.model_path.display()))
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(ArdeidaeError::AssetLoad(format!(
                "{}: not a non-empty file",
                config.model_path.display()
            )));
        }
        debug!(path = %config.model_path.display(), bytes = meta.len(), "scene content loaded");
        Ok(())
    }

    fn present(&mut self, frame: &ViewFrame, _camera: &Camera) -> Result<(), ArdeidaeError> {
        self.bus
            .publish_to(Topic::Frames, Event::new(self.source.as_str(), EventPayload::Frame(frame.clone())))
            .map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame state
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable per-view state advanced by [`step`].
#[derive(Debug, Clone)]
pub struct ViewState {
    config: ViewConfig,
    camera: Camera,
    rotation: Rotation,
    frame: u64,
    width: u32,
    height: u32,
    content_loaded: bool,
}

impl ViewState {
    pub fn new(config: ViewConfig) -> Self {
        let camera = Camera::new(config.camera_z, config.width, config.height);
        Self {
            width: config.width,
            height: config.height,
            config,
            camera,
            rotation: Rotation::default(),
            frame: 0,
            content_loaded: false,
        }
    }

    /// Recompute aspect ratio and output size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.camera.aspect = aspect_ratio(width, height);
    }

    pub fn set_content_loaded(&mut self, loaded: bool) {
        self.content_loaded = loaded;
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    fn snapshot(&self) -> ViewFrame {
        ViewFrame {
            view: self.config.name.clone(),
            frame: self.frame,
            rotation: self.rotation,
            width: self.width,
            height: self.height,
            aspect: self.camera.aspect,
            content_loaded: self.content_loaded,
        }
    }
}

/// Advance `state` by one frame using `orientation`.
pub fn step(state: &mut ViewState, orientation: &OrientationSnapshot) -> ViewFrame {
    if state.config.auto_rotate {
        state.rotation.y += AUTO_ROTATE_STEP;
    }
    if state.content_loaded {
        for axis in Axis::ALL {
            let degrees = if state.config.apply_calibration {
                orientation.calibrated(axis)
            } else {
                orientation.reading(axis)
            };
            if let Some(deg) = degrees {
                state.rotation.set(axis, deg.to_radians());
            }
        }
    }
    state.frame += 1;
    state.snapshot()
}

// ─────────────────────────────────────────────────────────────────────────────
// Task and handle
// ─────────────────────────────────────────────────────────────────────────────

enum ViewCommand {
    Resize { width: u32, height: u32 },
    Stop,
}

/// Owner of a running view task.
pub struct ViewHandle {
    name: String,
    cmd_tx: mpsc::UnboundedSender<ViewCommand>,
    frames: watch::Receiver<ViewFrame>,
    join: JoinHandle<()>,
}

impl ViewHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Notify the view that its output surface changed size.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), ArdeidaeError> {
        self.cmd_tx
            .send(ViewCommand::Resize { width, height })
            .map_err(|_| ArdeidaeError::ViewClosed(self.name.clone()))
    }

    /// The most recently rendered frame.
    pub fn latest_frame(&self) -> ViewFrame {
        self.frames.borrow().clone()
    }

    pub fn frames(&self) -> watch::Receiver<ViewFrame> {
        self.frames.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    /// Stop the frame task and wait for it to exit.
    pub async fn stop(self) -> Result<(), ArdeidaeError> {
        let _ = self.cmd_tx.send(ViewCommand::Stop);
        self.join
            .await
            .map_err(|e| ArdeidaeError::Channel(format!("view '{}' task failed: {e}", self.name)))
    }
}

/// Start the frame task for `config`.
pub fn spawn_view<V: SceneView>(
    config: ViewConfig,
    orientation: watch::Receiver<OrientationSnapshot>,
    mut view: V,
    frame_rate: u32,
) -> ViewHandle {
    let name = config.name.clone();
    let mut state = ViewState::new(config);
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames) = watch::channel(state.snapshot());
    let period = Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)));

    let view_name = name.clone();
    let join = tokio::spawn(async move {
        match view.load_content(&state.config).await {
            Ok(()) => state.set_content_loaded(true),
            Err(e) => warn!(view = %view_name, error = %e, "scene content failed to load; rendering without it"),
        }
        info!(view = %view_name, fps = frame_rate, loaded = state.content_loaded, "render loop started");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = *orientation.borrow();
                    let frame = step(&mut state, &snapshot);
                    if let Err(e) = view.present(&frame, &state.camera) {
                        warn!(view = %view_name, error = %e, "frame presentation failed");
                    }
                    frames_tx.send_replace(frame);
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(ViewCommand::Resize { width, height }) => {
                        state.resize(width, height);
                        debug!(view = %view_name, width, height, aspect = state.camera.aspect, "view resized");
                    }
                    Some(ViewCommand::Stop) | None => break,
                },
            }
        }
        info!(view = %view_name, frames = state.frame, "render loop stopped");
    });

    ViewHandle {
        name,
        cmd_tx,
        frames,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardeidae_types::CalibrationSnapshot;
    use std::sync::Mutex;

    fn orientation(calibrated: [Option<f64>; 3], readings: [Option<f64>; 3]) -> OrientationSnapshot {
        OrientationSnapshot {
            readings,
            calibrated,
            baseline: CalibrationSnapshot::ZERO,
            ..OrientationSnapshot::default()
        }
    }

    fn loaded(config: ViewConfig) -> ViewState {
        let mut state = ViewState::new(config);
        state.set_content_loaded(true);
        state
    }

    /// Records frames in memory; content loading can be made to fail.
    #[derive(Clone, Default)]
    struct RecordingView {
        fail_load: bool,
        frames: Arc<Mutex<Vec<ViewFrame>>>,
    }

    #[async_trait]
    impl SceneView for RecordingView {
        async fn load_content(&mut self, config: &ViewConfig) -> Result<(), ArdeidaeError> {
            if self.fail_load {
                Err(ArdeidaeError::AssetLoad(config.model_path.display().to_string()))
            } else {
                Ok(())
            }
        }

        fn present(&mut self, frame: &ViewFrame, _camera: &Camera) -> Result<(), ArdeidaeError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn calibrated_view_uses_offsets_in_radians() {
        let mut state = loaded(ViewConfig::hand("assets"));
        let frame = step(&mut state, &orientation([Some(5.0), Some(0.0), None], [Some(15.0), Some(20.0), None]));
        assert!((frame.rotation.x - 5f64.to_radians()).abs() < 1e-12);
        assert_eq!(frame.rotation.y, 0.0);
        assert_eq!(frame.frame, 1);
    }

    #[test]
    fn raw_view_ignores_calibration() {
        let mut state = loaded(ViewConfig::sensor("assets"));
        let frame = step(&mut state, &orientation([Some(5.0), None, None], [Some(90.0), None, None]));
        assert!((frame.rotation.x - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn missing_axis_keeps_previous_rotation() {
        let mut state = loaded(ViewConfig::hand("assets"));
        step(&mut state, &orientation([Some(10.0), Some(20.0), Some(30.0)], [None; 3]));
        let frame = step(&mut state, &orientation([Some(11.0), None, None], [None; 3]));
        assert!((frame.rotation.x - 11f64.to_radians()).abs() < 1e-12);
        assert!((frame.rotation.y - 20f64.to_radians()).abs() < 1e-12);
        assert!((frame.rotation.z - 30f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn orientation_waits_for_content_but_auto_rotation_does_not() {
        let mut config = ViewConfig::sensor("assets");
        config.auto_rotate = true;
        let mut state = ViewState::new(config);
        let snap = orientation([None; 3], [Some(45.0), None, None]);

        let frame = step(&mut state, &snap);
        assert_eq!(frame.rotation.x, 0.0);
        assert!((frame.rotation.y - AUTO_ROTATE_STEP).abs() < 1e-12);

        state.set_content_loaded(true);
        let frame = step(&mut state, &snap);
        assert!((frame.rotation.x - 45f64.to_radians()).abs() < 1e-12);
        assert!((frame.rotation.y - 2.0 * AUTO_ROTATE_STEP).abs() < 1e-12);
    }

    #[test]
    fn resize_recomputes_aspect() {
        let mut state = ViewState::new(ViewConfig::hand("assets"));
        state.resize(1920, 1080);
        assert!((state.camera().aspect - 16.0 / 9.0).abs() < 1e-12);
        state.resize(300, 0);
        assert_eq!(state.camera().aspect, 300.0);
        assert_eq!(state.camera().fov_deg, FIELD_OF_VIEW_DEG);
    }

    #[tokio::test]
    async fn bus_view_reports_missing_content() {
        let bus = Arc::new(EventBus::default());
        let mut view = BusSceneView::new(bus, "hand");
        let config = ViewConfig::hand("/definitely/not/here");
        assert!(matches!(view.load_content(&config).await, Err(ArdeidaeError::AssetLoad(_))));
    }

    #[tokio::test]
    async fn bus_view_loads_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("handLowpoly.glb"), b"glTF").unwrap();
        let bus = Arc::new(EventBus::default());
        let mut view = BusSceneView::new(bus, "hand");
        assert!(view.load_content(&ViewConfig::hand(dir.path())).await.is_ok());
    }

    #[tokio::test]
    async fn bus_view_rejects_empty_content_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("handLowpoly.glb"), b"").unwrap();
        std::fs::create_dir(dir.path().join("lissajous.glb")).unwrap();
        let bus = Arc::new(EventBus::default());

        let mut hand = BusSceneView::new(Arc::clone(&bus), "hand");
        assert!(matches!(
            hand.load_content(&ViewConfig::hand(dir.path())).await,
            Err(ArdeidaeError::AssetLoad(_))
        ));
        let mut sensor = BusSceneView::new(bus, "sensor");
        assert!(matches!(
            sensor.load_content(&ViewConfig::sensor(dir.path())).await,
            Err(ArdeidaeError::AssetLoad(_))
        ));
    }

    /// Content loading that yields on a timer still finishes before the
    /// first frame that applies orientation.
    struct SlowLoadView {
        frames: Arc<Mutex<Vec<ViewFrame>>>,
    }

    #[async_trait]
    impl SceneView for SlowLoadView {
        async fn load_content(&mut self, _config: &ViewConfig) -> Result<(), ArdeidaeError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }

        fn present(&mut self, frame: &ViewFrame, _camera: &Camera) -> Result<(), ArdeidaeError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn async_content_load_completes_before_rendering() {
        let (_tx, rx) = watch::channel(orientation([Some(30.0), None, None], [None; 3]));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let view = SlowLoadView {
            frames: Arc::clone(&frames),
        };
        let handle = spawn_view(ViewConfig::hand("assets"), rx, view, 200);
        let mut latest = handle.frames();
        tokio::time::timeout(Duration::from_secs(2), latest.wait_for(|f| f.frame >= 2))
            .await
            .unwrap()
            .unwrap();
        handle.stop().await.unwrap();

        let frames = frames.lock().unwrap();
        assert!(frames.iter().all(|f| f.content_loaded));
        assert!((frames[0].rotation.x - 30f64.to_radians()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn running_view_renders_resizes_and_stops() {
        let (orientation_tx, orientation_rx) = watch::channel(OrientationSnapshot::default());
        let view = RecordingView::default();
        let recorded = Arc::clone(&view.frames);
        let handle = spawn_view(ViewConfig::hand("assets"), orientation_rx, view, 200);
        let mut frames = handle.frames();

        orientation_tx.send_replace(orientation([Some(30.0), None, None], [None; 3]));
        tokio::time::timeout(
            Duration::from_secs(2),
            frames.wait_for(|f| (f.rotation.x - 30f64.to_radians()).abs() < 1e-12),
        )
        .await
        .unwrap()
        .unwrap();

        handle.resize(800, 400).unwrap();
        tokio::time::timeout(Duration::from_secs(2), frames.wait_for(|f| f.width == 800 && f.aspect == 2.0))
            .await
            .unwrap()
            .unwrap();
        assert!(handle.is_running());
        assert_eq!(handle.name(), "hand");

        handle.stop().await.unwrap();
        let count = recorded.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(recorded.lock().unwrap().len(), count);
    }

    #[tokio::test]
    async fn failed_content_load_keeps_the_loop_running() {
        let (_orientation_tx, orientation_rx) = watch::channel(orientation([Some(30.0), None, None], [None; 3]));
        let view = RecordingView {
            fail_load: true,
            ..RecordingView::default()
        };
        let mut config = ViewConfig::hand("assets");
        config.auto_rotate = true;
        let handle = spawn_view(config, orientation_rx, view, 200);
        let mut frames = handle.frames();

        let frame = tokio::time::timeout(Duration::from_secs(2), frames.wait_for(|f| f.frame >= 3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert!(!frame.content_loaded);
        assert_eq!(frame.rotation.x, 0.0);
        assert!(frame.rotation.y > 0.0);

        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_every_handle_ends_the_loop() {
        let (_tx, rx) = watch::channel(OrientationSnapshot::default());
        let handle = spawn_view(ViewConfig::sensor("assets"), rx, RecordingView::default(), 100);
        let ViewHandle { cmd_tx, join, .. } = handle;
        drop(cmd_tx);
        tokio::time::timeout(Duration::from_secs(2), join).await.unwrap().unwrap();
    }
}
