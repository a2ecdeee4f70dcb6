//! Calibration set and the store shared with the settings notifier
//!
//! The settings notifier runs in another context and replaces the whole set
//! at once. The acquisition loop takes one snapshot per cycle. Both go through
//! a critical section around a `Cell`, so a reader can never observe half of
//! an update.

use core::cell::Cell;

use critical_section::Mutex;
use nalgebra::Vector3;

/// Bias/scale vectors for the accelerometer and magnetometer
///
/// Calibration is applied as:
/// - Accel: `value * accel_scale - accel_bias` (value already in m/s²)
/// - Mag: `raw * mag_scale - mag_bias` (raw counts, see [`Self::apply_mag`])
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSet {
    pub mag_bias: Vector3<f32>,
    pub mag_scale: Vector3<f32>,
    pub accel_bias: Vector3<f32>,
    pub accel_scale: Vector3<f32>,
}

impl CalibrationSet {
    /// Startup value before the first settings notification
    ///
    /// Zero scale suppresses accel and mag output to `-bias` (zero) instead of
    /// publishing unscaled data in the wrong units.
    pub const fn zeroed() -> Self {
        Self {
            mag_bias: Vector3::new(0.0, 0.0, 0.0),
            mag_scale: Vector3::new(0.0, 0.0, 0.0),
            accel_bias: Vector3::new(0.0, 0.0, 0.0),
            accel_scale: Vector3::new(0.0, 0.0, 0.0),
        }
    }

    /// Unit scale, zero bias
    pub const fn identity() -> Self {
        Self {
            mag_bias: Vector3::new(0.0, 0.0, 0.0),
            mag_scale: Vector3::new(1.0, 1.0, 1.0),
            accel_bias: Vector3::new(0.0, 0.0, 0.0),
            accel_scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// `false` while any scale component is zero
    pub fn is_calibrated(&self) -> bool {
        self.accel_scale.iter().all(|s| *s != 0.0) && self.mag_scale.iter().all(|s| *s != 0.0)
    }

    /// Calibrate a scaled, body-frame accelerometer vector
    pub fn apply_accel(&self, scaled: Vector3<f32>) -> Vector3<f32> {
        scaled.component_mul(&self.accel_scale) - self.accel_bias
    }

    /// Calibrate a body-frame magnetometer vector in raw counts
    ///
    /// Magnetometer bias and scale were fitted against raw counts, so no
    /// physical scale factor is applied first.
    pub fn apply_mag(&self, raw: Vector3<f32>) -> Vector3<f32> {
        raw.component_mul(&self.mag_scale) - self.mag_bias
    }
}

impl Default for CalibrationSet {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Calibration set shared between the settings notifier and the loop
pub struct CalibrationStore {
    active: Mutex<Cell<CalibrationSet>>,
}

impl CalibrationStore {
    /// Store holding [`CalibrationSet::zeroed`]
    pub const fn new() -> Self {
        Self {
            active: Mutex::new(Cell::new(CalibrationSet::zeroed())),
        }
    }

    /// Replace the active set (settings-change notification)
    pub fn update(&self, set: CalibrationSet) {
        critical_section::with(|cs| self.active.borrow(cs).set(set));
    }

    /// Consistent snapshot of the active set
    pub fn read(&self) -> CalibrationSet {
        critical_section::with(|cs| self.active.borrow(cs).get())
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}
