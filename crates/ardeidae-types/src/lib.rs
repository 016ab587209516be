use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One of the three orientation axes reported by the sensor rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in `x`, `y`, `z` order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of the axis inside `[x, y, z]` arrays.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// A discriminated telemetry event produced by the host process.
///
/// `address` is a slash-separated path (e.g. `/accelerometer/angx`) and
/// `value` the numeric payload. Only the first element is meaningful for
/// every address the dashboard recognises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddressedMessage {
    pub address: String,
    pub value: Vec<f64>,
}

impl AddressedMessage {
    pub fn new(address: impl Into<String>, value: Vec<f64>) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }

    /// First element of the payload, if any.
    pub fn first(&self) -> Option<f64> {
        self.value.first().copied()
    }
}

/// Baseline orientation (degrees) subtracted from live readings.
///
/// Always replaced as a whole; never updated one axis at a time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CalibrationSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CalibrationSnapshot {
    pub const ZERO: CalibrationSnapshot = CalibrationSnapshot {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Where the calibration baseline lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationMode {
    /// The dashboard keeps the snapshot itself.
    #[default]
    Local,
    /// The snapshot is pushed to the host with `setOffsetCoordinates` and the
    /// host's per-axis offsets are used as the baseline.
    #[serde(alias = "host-persisted")]
    Host,
}

impl std::fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationMode::Local => write!(f, "local"),
            CalibrationMode::Host => write!(f, "host"),
        }
    }
}

impl std::str::FromStr for CalibrationMode {
    type Err = ArdeidaeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(CalibrationMode::Local),
            "host" | "host-persisted" => Ok(CalibrationMode::Host),
            other => Err(ArdeidaeError::Config(format!(
                "unknown calibration mode '{other}' (expected local or host)"
            ))),
        }
    }
}

/// Euler rotation of a scene, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Rotation {
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, radians: f64) {
        match axis {
            Axis::X => self.x = radians,
            Axis::Y => self.y = radians,
            Axis::Z => self.z = radians,
        }
    }
}

/// Immutable view of the ingestion/calibration state handed to renderers.
///
/// `readings` are the raw current angles (degrees), `calibrated` the
/// readings minus the active baseline. An axis that never received a
/// reading is `None` in both arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationSnapshot {
    pub readings: [Option<f64>; 3],
    pub calibrated: [Option<f64>; 3],
    pub distance: Option<f64>,
    pub baseline: CalibrationSnapshot,
    pub mode: CalibrationMode,
    /// Incremented every time a calibration replaces the baseline.
    pub calibration_epoch: u64,
}

impl OrientationSnapshot {
    pub fn reading(&self, axis: Axis) -> Option<f64> {
        self.readings[axis.index()]
    }

    pub fn calibrated(&self, axis: Axis) -> Option<f64> {
        self.calibrated[axis.index()]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Styled log text
// ────────────────────────────────────────────────────────────────────────────

/// The eight terminal colours understood by the log formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    /// Map an SGR colour offset (`0..=7`) to a colour.
    pub fn from_offset(offset: u8) -> Option<Self> {
        Some(match offset {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            _ => return None,
        })
    }

    /// Colour name used by the cockpit page for this colour.
    pub fn css_name(self) -> &'static str {
        match self {
            Color::Black => "black",
            Color::Red => "red",
            Color::Green => "greenyellow",
            Color::Yellow => "yellow",
            Color::Blue => "deepskyblue",
            Color::Magenta => "magenta",
            Color::Cyan => "cyan",
            Color::White => "white",
        }
    }
}

/// Display attributes of a run of log text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub bold: bool,
    pub underline: bool,
}

impl Style {
    /// `true` when no attribute is set.
    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A run of text sharing one [`Style`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledSegment {
    pub style: Style,
    pub text: String,
}

impl StyledSegment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            style: Style::default(),
            text: text.into(),
        }
    }
}

/// One line of the event log, already split into styled segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Arrival position, starting at zero.
    pub index: usize,
    pub segments: Vec<StyledSegment>,
}

impl LogEntry {
    /// The entry's text with all styling removed.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Derived indicator flags shown next to the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusIndicators {
    /// At least one log entry has arrived.
    pub sensors_started: bool,
    /// A Y-axis reading has arrived.
    pub accelerometer_active: bool,
    /// The "device connected" marker has been seen (never reverts).
    pub ring_connected: bool,
    /// The host collaborator answered the availability probe.
    pub host_available: bool,
}

/// State of one rendered scene view after a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewFrame {
    pub view: String,
    pub frame: u64,
    pub rotation: Rotation,
    pub width: u32,
    pub height: u32,
    pub aspect: f64,
    pub content_loaded: bool,
}

/// Operator actions issued from the cockpit or the REPL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorCommand {
    Calibrate,
    StartSensors,
}

// ────────────────────────────────────────────────────────────────────────────
// Host wire protocol
// ────────────────────────────────────────────────────────────────────────────

/// JSON frame exchanged with the host process.
///
/// `Osc` and `Log` flow host → dashboard; `StartSensors` and
/// `SetOffsetCoordinates` flow dashboard → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostFrame {
    Osc { address: String, value: Vec<f64> },
    Log { line: String },
    StartSensors,
    SetOffsetCoordinates { x: f64, y: f64, z: f64 },
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the dashboard event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. "ardeidae-middleware::host"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Raw addressed telemetry from the host.
    Telemetry(AddressedMessage),
    /// Raw terminal-style log line from the host.
    HostLog(String),
    /// Operator action requested by a UI surface.
    Operator(OperatorCommand),
    /// A view finished rendering a frame.
    Frame(ViewFrame),
    /// A formatted entry was appended to the event log.
    LogAppended {
        entry: LogEntry,
        status: StatusIndicators,
    },
    /// The status indicators changed without a new log entry.
    StatusChanged(StatusIndicators),
}

/// Global error type for the dashboard crates.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ArdeidaeError {
    #[error("host process is not available")]
    HostUnavailable,

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("view '{0}' is closed")]
    ViewClosed(String),

    #[error("Asset Error: {0}")]
    AssetLoad(String),
}
