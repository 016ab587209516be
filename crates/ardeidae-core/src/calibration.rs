//! Calibration State.
//!
//! Holds the baseline that is subtracted from live readings.  Two modes are
//! supported:
//!
//! * [`CalibrationMode::Local`] – [`CalibrationState::calibrate`] captures the
//!   current readings as the new snapshot.  Host offset messages are ignored.
//! * [`CalibrationMode::Host`] – the captured snapshot is adopted as the full
//!   host offset set and the caller pushes it to the host.  Offsets the host
//!   re-broadcasts afterwards arrive one axis at a time (X, then Y, then Z)
//!   and replace the baseline only once the whole set is in.
//!
//! A given state only ever uses one source for a given axis.
//!
//! # Example
//!
//! ```rust
//! use ardeidae_core::calibration::CalibrationState;
//! use ardeidae_types::{Axis, CalibrationMode};
//!
//! let mut cal = CalibrationState::new(CalibrationMode::Local);
//! cal.calibrate([Some(10.0), Some(20.0), None]);
//!
//! assert_eq!(cal.offset_angle(Axis::X, Some(15.0)), Some(5.0));
//! assert_eq!(cal.offset_angle(Axis::Y, Some(20.0)), Some(0.0));
//! assert_eq!(cal.offset_angle(Axis::Z, None), None);
//! ```

use ardeidae_types::{Axis, CalibrationMode, CalibrationSnapshot, OrientationSnapshot};
use tracing::{debug, info};

use crate::normalizer::TelemetryNormalizer;

#[derive(Debug, Clone)]
pub struct CalibrationState {
    mode: CalibrationMode,
    baseline: CalibrationSnapshot,
    epoch: u64,
    /// Host offsets of the set currently being received.
    pending: [Option<f64>; 3],
}

impl CalibrationState {
    /// Create a state with a zeroed baseline.
    pub fn new(mode: CalibrationMode) -> Self {
        Self {
            mode,
            baseline: CalibrationSnapshot::ZERO,
            epoch: 0,
            pending: [None; 3],
        }
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    /// The baseline currently subtracted from readings.
    pub fn baseline(&self) -> CalibrationSnapshot {
        self.baseline
    }

    /// Number of baseline replacements so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Capture `readings` as the new baseline and return it.
    ///
    /// All three axes are replaced in one assignment.  An axis that has no
    /// reading yet is captured as `0.0`; later readings on that axis are then
    /// relative to zero.  A partially received host offset set is discarded.
    pub fn calibrate(&mut self, readings: [Option<f64>; 3]) -> CalibrationSnapshot {
        let snapshot = CalibrationSnapshot::new(
            readings[0].unwrap_or(0.0),
            readings[1].unwrap_or(0.0),
            readings[2].unwrap_or(0.0),
        );
        self.baseline = snapshot;
        self.epoch += 1;
        self.pending = [None; 3];
        info!(
            mode = %self.mode,
            epoch = self.epoch,
            x = snapshot.x,
            y = snapshot.y,
            z = snapshot.z,
            "calibration captured"
        );
        snapshot
    }

    /// Collect an offset re-broadcast by the host for one axis.
    ///
    /// The host sends a set as X, Y, Z in that order.  An X offset opens a
    /// new set; Y and Z are kept only when they continue the open set, so
    /// leftovers of a set cut short by [`calibrate`](Self::calibrate) are
    /// dropped.  When Z completes a set that differs from the baseline, all
    /// three axes are replaced together and the epoch advances.
    ///
    /// Returns `true` when the baseline changed.  Local mode ignores host
    /// offsets entirely.
    pub fn apply_host_offset(&mut self, axis: Axis, degrees: f64) -> bool {
        if self.mode != CalibrationMode::Host {
            debug!(%axis, "host offset ignored in local calibration mode");
            return false;
        }
        match (axis, self.pending) {
            (Axis::X, _) => self.pending = [Some(degrees), None, None],
            (Axis::Y, [Some(_), None, None]) => self.pending[1] = Some(degrees),
            (Axis::Z, [Some(x), Some(y), None]) => {
                self.pending = [None; 3];
                return self.adopt_host_set(CalibrationSnapshot::new(x, y, degrees));
            }
            _ => {
                debug!(%axis, degrees, "host offset outside an open set dropped");
                self.pending = [None; 3];
            }
        }
        false
    }

    fn adopt_host_set(&mut self, offsets: CalibrationSnapshot) -> bool {
        if offsets == self.baseline {
            return false;
        }
        self.baseline = offsets;
        self.epoch += 1;
        info!(
            epoch = self.epoch,
            x = offsets.x,
            y = offsets.y,
            z = offsets.z,
            "host offsets adopted"
        );
        true
    }

    /// `reading − baseline(axis)`, or `None` when there is no reading.
    pub fn offset_angle(&self, axis: Axis, reading: Option<f64>) -> Option<f64> {
        reading.map(|deg| deg - self.baseline.get(axis))
    }

    /// Build the immutable view handed to renderers.
    pub fn orientation(&self, telemetry: &TelemetryNormalizer) -> OrientationSnapshot {
        let readings = telemetry.angles();
        let calibrated = Axis::ALL.map(|axis| self.offset_angle(axis, readings[axis.index()]));
        OrientationSnapshot {
            readings,
            calibrated,
            distance: telemetry.distance(),
            baseline: self.baseline,
            mode: self.mode,
            calibration_epoch: self.epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::{ANGLE_X, ANGLE_Y, ANGLE_Z};
    use ardeidae_types::AddressedMessage;

    fn feed(n: &mut TelemetryNormalizer, address: &str, value: f64) {
        n.ingest(&AddressedMessage::new(address, vec![value]));
    }

    #[test]
    fn offset_is_zero_right_after_calibration() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Local);
        for (i, v) in [3.0, -12.5, 87.0, 0.25].into_iter().enumerate() {
            feed(&mut n, [ANGLE_X, ANGLE_Y, ANGLE_Z][i % 3], v);
        }
        cal.calibrate(n.angles());
        let snap = cal.orientation(&n);
        for axis in Axis::ALL {
            assert_eq!(snap.calibrated(axis), Some(0.0), "axis {axis}");
        }
    }

    #[test]
    fn calibrate_then_move_x() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Local);
        feed(&mut n, ANGLE_X, 10.0);
        feed(&mut n, ANGLE_Y, 20.0);
        cal.calibrate(n.angles());
        feed(&mut n, ANGLE_X, 15.0);

        let snap = cal.orientation(&n);
        assert_eq!(snap.calibrated(Axis::X), Some(5.0));
        assert_eq!(snap.calibrated(Axis::Y), Some(0.0));
        assert_eq!(snap.calibrated(Axis::Z), None);
    }

    #[test]
    fn axis_without_reading_has_no_offset() {
        let cal = CalibrationState::new(CalibrationMode::Local);
        assert_eq!(cal.offset_angle(Axis::Z, None), None);
    }

    #[test]
    fn calibrating_before_readings_uses_zero_baseline() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Local);
        cal.calibrate(n.angles());
        assert_eq!(cal.baseline(), CalibrationSnapshot::ZERO);

        feed(&mut n, ANGLE_X, 33.0);
        assert_eq!(cal.orientation(&n).calibrated(Axis::X), Some(33.0));
    }

    #[test]
    fn calibration_replaces_all_axes_together() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Local);

        feed(&mut n, ANGLE_X, 1.0);
        feed(&mut n, ANGLE_Y, 2.0);
        feed(&mut n, ANGLE_Z, 3.0);
        let first = cal.calibrate(n.angles());

        feed(&mut n, ANGLE_X, 10.0);
        let between = cal.orientation(&n);
        assert_eq!(between.baseline, first);
        assert_eq!(between.calibration_epoch, 1);

        feed(&mut n, ANGLE_Z, 30.0);
        let second = cal.calibrate(n.angles());
        feed(&mut n, ANGLE_Y, 20.0);

        let snap = cal.orientation(&n);
        assert_eq!(snap.baseline, second);
        assert_eq!(snap.baseline, CalibrationSnapshot::new(10.0, 2.0, 30.0));
        assert_eq!(snap.calibration_epoch, 2);
    }

    #[test]
    fn local_mode_ignores_host_offsets() {
        let mut cal = CalibrationState::new(CalibrationMode::Local);
        assert!(!cal.apply_host_offset(Axis::X, 9.0));
        assert_eq!(cal.baseline(), CalibrationSnapshot::ZERO);
    }

    fn host_set(cal: &mut CalibrationState, x: f64, y: f64, z: f64) -> bool {
        cal.apply_host_offset(Axis::X, x);
        cal.apply_host_offset(Axis::Y, y);
        cal.apply_host_offset(Axis::Z, z)
    }

    #[test]
    fn host_mode_adopts_a_complete_offset_set() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Host);
        feed(&mut n, ANGLE_X, 50.0);
        feed(&mut n, ANGLE_Y, 50.0);

        assert!(!cal.apply_host_offset(Axis::X, 20.0));
        assert!(!cal.apply_host_offset(Axis::Y, 10.0));
        assert_eq!(cal.baseline(), CalibrationSnapshot::ZERO);
        assert_eq!(cal.epoch(), 0);

        assert!(cal.apply_host_offset(Axis::Z, 5.0));
        let snap = cal.orientation(&n);
        assert_eq!(snap.baseline, CalibrationSnapshot::new(20.0, 10.0, 5.0));
        assert_eq!(snap.calibration_epoch, 1);
        assert_eq!(snap.calibrated(Axis::X), Some(30.0));
        assert_eq!(snap.calibrated(Axis::Y), Some(40.0));
    }

    #[test]
    fn late_echo_of_a_superseded_push_cannot_tear_the_baseline() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Host);
        for (address, v) in [(ANGLE_X, 10.0), (ANGLE_Y, 20.0), (ANGLE_Z, 30.0)] {
            feed(&mut n, address, v);
        }
        cal.calibrate(n.angles());
        cal.apply_host_offset(Axis::X, 10.0);

        for (address, v) in [(ANGLE_X, 50.0), (ANGLE_Y, 60.0), (ANGLE_Z, 70.0)] {
            feed(&mut n, address, v);
        }
        let second = cal.calibrate(n.angles());
        assert!(!cal.apply_host_offset(Axis::Y, 20.0));
        assert!(!cal.apply_host_offset(Axis::Z, 30.0));

        let snap = cal.orientation(&n);
        assert_eq!(snap.calibration_epoch, 2);
        assert_eq!(snap.baseline, second);
        assert_eq!(snap.baseline, CalibrationSnapshot::new(50.0, 60.0, 70.0));

        // The echo of the second push matches and changes nothing.
        assert!(!host_set(&mut cal, 50.0, 60.0, 70.0));
        assert_eq!(cal.epoch(), 2);
    }

    #[test]
    fn out_of_order_offsets_reset_the_open_set() {
        let mut cal = CalibrationState::new(CalibrationMode::Host);
        cal.apply_host_offset(Axis::X, 1.0);
        cal.apply_host_offset(Axis::Z, 3.0);
        assert!(!cal.apply_host_offset(Axis::Y, 2.0));
        assert!(!cal.apply_host_offset(Axis::Z, 3.0));
        assert_eq!(cal.baseline(), CalibrationSnapshot::ZERO);

        assert!(host_set(&mut cal, 4.0, 5.0, 6.0));
        assert_eq!(cal.baseline(), CalibrationSnapshot::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn host_mode_calibrate_adopts_snapshot_immediately() {
        let mut n = TelemetryNormalizer::new();
        let mut cal = CalibrationState::new(CalibrationMode::Host);
        feed(&mut n, ANGLE_X, 12.0);
        feed(&mut n, ANGLE_Y, -4.0);
        feed(&mut n, ANGLE_Z, 7.0);

        let pushed = cal.calibrate(n.angles());
        assert_eq!(pushed, CalibrationSnapshot::new(12.0, -4.0, 7.0));
        let snap = cal.orientation(&n);
        for axis in Axis::ALL {
            assert_eq!(snap.calibrated(axis), Some(0.0));
        }
    }
}
