//! Conversion from accumulated raw counts to published measurements
//!
//! Order of operations per class:
//!
//! ```text
//! accel: remap(mean) * scale * accel_scale - accel_bias
//! gyro:  remap(mean) * scale [+ bias estimate]
//! mag:   remap(mean) * mag_scale - mag_bias          (raw counts)
//! ```
//!
//! Body frame axes: `(x, y, z) = (raw_y, raw_x, -raw_z)`.

use nalgebra::Vector3;

use super::accumulator::SampleAccumulator;
use super::calibration::CalibrationSet;
use crate::devices::traits::TemperatureModel;

/// Published temperature before any valid reading
pub const TEMPERATURE_UNKNOWN: f32 = f32::NAN;

/// Accelerometer or gyroscope record published once per cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledMeasurement {
    pub x: f32,
    pub y: f32,
    pub z: f32,

    /// Die temperature in °C
    pub temperature: f32,
}

impl ScaledMeasurement {
    pub fn new(vector: Vector3<f32>, temperature: f32) -> Self {
        Self {
            x: vector.x,
            y: vector.y,
            z: vector.z,
            temperature,
        }
    }

    pub fn vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl Default for ScaledMeasurement {
    fn default() -> Self {
        Self::new(Vector3::zeros(), TEMPERATURE_UNKNOWN)
    }
}

/// Magnetometer record (calibrated raw units)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagMeasurement {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl MagMeasurement {
    pub fn new(vector: Vector3<f32>) -> Self {
        Self {
            x: vector.x,
            y: vector.y,
            z: vector.z,
        }
    }
}

/// Map sensor axes onto the body frame
#[inline]
pub fn remap_axes(raw: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(raw.y, raw.x, -raw.z)
}

/// Accelerometer vector for this cycle, `None` if no samples arrived
pub fn convert_accel(
    acc: &SampleAccumulator,
    scale: f32,
    calibration: &CalibrationSet,
) -> Option<Vector3<f32>> {
    let body = remap_axes(acc.mean()?);
    Some(calibration.apply_accel(body * scale))
}

/// Gyroscope vector for this cycle, `None` if no samples arrived
pub fn convert_gyro(
    acc: &SampleAccumulator,
    scale: f32,
    bias: Option<Vector3<f32>>,
) -> Option<Vector3<f32>> {
    let rates = remap_axes(acc.mean()?) * scale;
    Some(match bias {
        Some(bias) => rates + bias,
        None => rates,
    })
}

/// Magnetometer vector for this cycle, `None` if no new sample arrived
pub fn convert_mag(acc: &SampleAccumulator, calibration: &CalibrationSet) -> Option<Vector3<f32>> {
    let body = remap_axes(acc.mean()?);
    Some(calibration.apply_mag(body))
}

/// Holds the last valid die temperature of one sensor class
#[derive(Debug, Clone, Copy)]
pub struct TemperatureTracker {
    last_c: f32,
}

impl TemperatureTracker {
    pub const fn new() -> Self {
        Self {
            last_c: TEMPERATURE_UNKNOWN,
        }
    }

    /// Temperature to publish this cycle
    ///
    /// Converts the cycle's mean code when both a model and a code exist,
    /// otherwise repeats the last valid reading.
    pub fn update(&mut self, model: Option<TemperatureModel>, acc: &SampleAccumulator) -> f32 {
        if let (Some(model), Some(code)) = (model, acc.mean_temperature_code()) {
            self.last_c = model.celsius(code);
        }
        self.last_c
    }
}

impl Default for TemperatureTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::traits::RawSample;

    const EPSILON: f32 = 1e-6;

    fn accumulate(samples: &[RawSample]) -> SampleAccumulator {
        let mut acc = SampleAccumulator::new();
        acc.extend(samples);
        acc
    }

    #[test]
    fn remap_swaps_xy_and_negates_z() {
        let v = remap_axes(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vector3::new(2.0, 1.0, -3.0));
    }

    #[test]
    fn remap_twice_restores_input() {
        let raw = Vector3::new(0.5, -7.25, 3.0);
        assert_eq!(remap_axes(remap_axes(raw)), raw);
    }

    #[test]
    fn accel_calibration_round_trip_to_zero() {
        // Raw (2, 1, -3) remaps to body (1, 2, 3)
        let acc = accumulate(&[RawSample::new([2, 1, -3]); 5]);
        let cal = CalibrationSet {
            accel_bias: Vector3::new(1.0, 2.0, 3.0),
            ..CalibrationSet::identity()
        };
        let out = convert_accel(&acc, 1.0, &cal).unwrap();
        assert!(out.norm() < EPSILON);
    }

    #[test]
    fn accel_applies_physical_scale_then_calibration() {
        let acc = accumulate(&[RawSample::new([0, 100, 50])]);
        let cal = CalibrationSet {
            accel_scale: Vector3::new(2.0, 1.0, 1.0),
            accel_bias: Vector3::new(0.0, 0.0, 1.0),
            ..CalibrationSet::identity()
        };
        let out = convert_accel(&acc, 0.01, &cal).unwrap();
        // body = (100, 0, -50) * 0.01 = (1, 0, -0.5)
        assert!((out.x - 2.0).abs() < EPSILON);
        assert!(out.y.abs() < EPSILON);
        assert!((out.z - (-1.5)).abs() < EPSILON);
    }

    #[test]
    fn empty_class_produces_nothing() {
        let acc = SampleAccumulator::new();
        let cal = CalibrationSet::identity();
        assert_eq!(convert_accel(&acc, 1.0, &cal), None);
        assert_eq!(convert_gyro(&acc, 1.0, None), None);
        assert_eq!(convert_mag(&acc, &cal), None);
    }

    #[test]
    fn gyro_bias_is_added_when_present() {
        let acc = accumulate(&[RawSample::new([10, 20, 30]), RawSample::new([30, 40, 50])]);
        let plain = convert_gyro(&acc, 0.1, None).unwrap();
        assert!((plain.x - 3.0).abs() < EPSILON);
        assert!((plain.y - 2.0).abs() < EPSILON);
        assert!((plain.z - (-4.0)).abs() < EPSILON);

        let corrected = convert_gyro(&acc, 0.1, Some(Vector3::new(0.5, -0.5, 1.0))).unwrap();
        assert!((corrected.x - 3.5).abs() < EPSILON);
        assert!((corrected.y - 1.5).abs() < EPSILON);
        assert!((corrected.z - (-3.0)).abs() < EPSILON);
    }

    #[test]
    fn mag_ignores_physical_scale() {
        let acc = accumulate(&[RawSample::new([100, 200, 300])]);
        let cal = CalibrationSet {
            mag_scale: Vector3::new(0.5, 0.5, 0.5),
            mag_bias: Vector3::new(10.0, 0.0, 0.0),
            ..CalibrationSet::identity()
        };
        let out = convert_mag(&acc, &cal).unwrap();
        assert!((out.x - 90.0).abs() < EPSILON);
        assert!((out.y - 50.0).abs() < EPSILON);
        assert!((out.z - (-150.0)).abs() < EPSILON);
    }

    #[test]
    fn temperature_tracker_holds_last_valid_reading() {
        let mut tracker = TemperatureTracker::new();
        assert!(tracker.last_c.is_nan());

        let without = accumulate(&[RawSample::new([0, 0, 0])]);
        assert!(tracker.update(Some(TemperatureModel::MPU6000), &without).is_nan());

        let with = accumulate(&[RawSample::with_temperature([0, 0, 0], -512)]);
        let t = tracker.update(Some(TemperatureModel::MPU6000), &with);
        assert!((t - 35.0).abs() < EPSILON);

        // No model, no code: previous reading is repeated
        assert!((tracker.update(None, &with) - 35.0).abs() < EPSILON);
        assert!((tracker.update(Some(TemperatureModel::MPU6000), &without) - 35.0).abs() < EPSILON);
    }

    #[test]
    fn scaled_measurement_round_trips_vector() {
        let m = ScaledMeasurement::new(Vector3::new(1.0, 2.0, 3.0), 30.0);
        assert_eq!(m.vector(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(m.temperature, 30.0);
        assert!(ScaledMeasurement::default().temperature.is_nan());
    }
}
