//! Inputs shared with other tasks and the outputs the acquisition task drives

use super::bias::GyroBiasFeedback;
use super::calibration::CalibrationStore;
use super::conversion::{MagMeasurement, ScaledMeasurement};
use crate::communication::telemetry::{AuxRecords, DebugLink};
use crate::core::traits::{AlarmSink, Watchdog};

/// State written by other tasks and read by the acquisition task
///
/// Every field is safe to share, so a single `static` instance can be handed
/// to the calibration, attitude and GPS/baro tasks.
///
/// ```ignore
/// static SENSOR_INPUTS: SensorInputs = SensorInputs::new();
/// ```
pub struct SensorInputs {
    /// Accel/mag calibration, replaced as a whole
    pub calibration: CalibrationStore,

    /// Gyro bias estimate from the attitude estimator
    pub gyro_bias: GyroBiasFeedback,

    /// Latest GPS and baro records for the debug frame
    pub aux: AuxRecords,
}

impl SensorInputs {
    pub const fn new() -> Self {
        Self {
            calibration: CalibrationStore::new(),
            gyro_bias: GyroBiasFeedback::new(true),
            aux: AuxRecords::new(),
        }
    }
}

impl Default for SensorInputs {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination for published measurements (the data bus)
pub trait MeasurementSink {
    fn publish_accel(&mut self, accel: &ScaledMeasurement);

    fn publish_gyro(&mut self, gyro: &ScaledMeasurement);

    fn publish_mag(&mut self, mag: &MagMeasurement);
}

/// Everything the acquisition task writes to
pub struct SensorOutputs<'a> {
    pub measurements: &'a mut dyn MeasurementSink,
    pub alarms: &'a mut dyn AlarmSink,
    pub watchdog: &'a mut dyn Watchdog,

    /// Optional diagnostic byte link
    pub debug_link: Option<&'a mut dyn DebugLink>,
}

// ============================================================================
// Mock Implementation (always available for testing)
// ============================================================================

/// Measurement sink that keeps the last record of each class
#[derive(Debug, Default)]
pub struct RecordingSink {
    accel: Option<ScaledMeasurement>,
    gyro: Option<ScaledMeasurement>,
    mag: Option<MagMeasurement>,
    accel_count: u32,
    gyro_count: u32,
    mag_count: u32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accel(&self) -> Option<ScaledMeasurement> {
        self.accel
    }

    pub fn last_gyro(&self) -> Option<ScaledMeasurement> {
        self.gyro
    }

    pub fn last_mag(&self) -> Option<MagMeasurement> {
        self.mag
    }

    pub fn accel_count(&self) -> u32 {
        self.accel_count
    }

    pub fn gyro_count(&self) -> u32 {
        self.gyro_count
    }

    pub fn mag_count(&self) -> u32 {
        self.mag_count
    }

    /// Total records published across all classes
    pub fn total(&self) -> u32 {
        self.accel_count + self.gyro_count + self.mag_count
    }
}

impl MeasurementSink for RecordingSink {
    fn publish_accel(&mut self, accel: &ScaledMeasurement) {
        self.accel = Some(*accel);
        self.accel_count += 1;
    }

    fn publish_gyro(&mut self, gyro: &ScaledMeasurement) {
        self.gyro = Some(*gyro);
        self.gyro_count += 1;
    }

    fn publish_mag(&mut self, mag: &MagMeasurement) {
        self.mag = Some(*mag);
        self.mag_count += 1;
    }
}
