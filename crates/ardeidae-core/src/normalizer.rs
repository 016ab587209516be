//! Telemetry Normalizer.
//!
//! Turns raw [`AddressedMessage`]s into typed [`Reading`]s and keeps the
//! single "current" slot for each of them.  Dispatch is a fixed table keyed
//! on the message address:
//!
//! | Address | Reading |
//! |---|---|
//! | `/accelerometer/angx` … `angz` | [`Reading::Angle`] (degrees) |
//! | `/accelerometer/offsetx` … `offsetz` | [`Reading::Offset`] (degrees, host-persisted baseline) |
//! | `/distance` | [`Reading::Distance`], clamped to at most [`DISTANCE_MAX`] |
//!
//! Unknown addresses and empty payloads are ignored.  Every slot is
//! last-writer-wins; no smoothing or history is kept.

use ardeidae_types::{AddressedMessage, Axis};
use tracing::debug;

/// Upper bound applied to distance readings.
///
/// Only the upper bound is enforced.  Negative values pass through
/// unchanged, matching the rig's observed behaviour.
pub const DISTANCE_MAX: f64 = 40.0;

pub const ANGLE_X: &str = "/accelerometer/angx";
pub const ANGLE_Y: &str = "/accelerometer/angy";
pub const ANGLE_Z: &str = "/accelerometer/angz";
pub const OFFSET_X: &str = "/accelerometer/offsetx";
pub const OFFSET_Y: &str = "/accelerometer/offsety";
pub const OFFSET_Z: &str = "/accelerometer/offsetz";
pub const DISTANCE: &str = "/distance";

/// A typed value extracted from one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Angle(Axis, f64),
    Offset(Axis, f64),
    Distance(f64),
}

/// Clamp a raw distance to [`DISTANCE_MAX`].
pub fn clamp_distance(raw: f64) -> f64 {
    raw.min(DISTANCE_MAX)
}

/// Map `message` to a [`Reading`], or `None` for unknown addresses and empty
/// payloads.
pub fn classify(message: &AddressedMessage) -> Option<Reading> {
    let value = message.first()?;
    let reading = match message.address.as_str() {
        ANGLE_X => Reading::Angle(Axis::X, value),
        ANGLE_Y => Reading::Angle(Axis::Y, value),
        ANGLE_Z => Reading::Angle(Axis::Z, value),
        OFFSET_X => Reading::Offset(Axis::X, value),
        OFFSET_Y => Reading::Offset(Axis::Y, value),
        OFFSET_Z => Reading::Offset(Axis::Z, value),
        DISTANCE => Reading::Distance(clamp_distance(value)),
        _ => return None,
    };
    Some(reading)
}

/// Current-value store for every recognised address.
#[derive(Debug, Clone, Default)]
pub struct TelemetryNormalizer {
    angles: [Option<f64>; 3],
    offsets: [Option<f64>; 3],
    distance: Option<f64>,
}

impl TelemetryNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one message and return the reading it produced.
    ///
    /// Returns `None` (and changes nothing) when the address is unknown.
    pub fn ingest(&mut self, message: &AddressedMessage) -> Option<Reading> {
        let Some(reading) = classify(message) else {
            debug!(address = %message.address, "ignoring unrecognised address");
            return None;
        };
        match reading {
            Reading::Angle(axis, deg) => self.angles[axis.index()] = Some(deg),
            Reading::Offset(axis, deg) => self.offsets[axis.index()] = Some(deg),
            Reading::Distance(d) => self.distance = Some(d),
        }
        Some(reading)
    }

    /// Latest angle for `axis`, `None` until the first reading arrives.
    pub fn angle(&self, axis: Axis) -> Option<f64> {
        self.angles[axis.index()]
    }

    /// All three current angles in `[x, y, z]` order.
    pub fn angles(&self) -> [Option<f64>; 3] {
        self.angles
    }

    /// Latest host-pushed offset for `axis`.
    pub fn host_offset(&self, axis: Axis) -> Option<f64> {
        self.offsets[axis.index()]
    }

    /// Latest (clamped) distance.
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }
}
