//! Sensor acquisition subsystem
//!
//! Turns raw inertial samples into calibrated, body-frame measurements at a
//! fixed rate and publishes them for attitude estimation.
//!
//! ## Data flow
//!
//! ```text
//!  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!  │   Gyro   │  │  Accel   │  │   Mag    │   SampleSource
//!  └────┬─────┘  └────┬─────┘  └────┬─────┘
//!       └─────────────┼─────────────┘
//!                     ▼
//!            ┌─────────────────┐     CalibrationStore
//!            │   SensorsTask   │ ◀── GyroBiasFeedback
//!            └────────┬────────┘     AuxRecords (GPS/baro)
//!       ┌─────────────┼─────────────┬──────────────┐
//!       ▼             ▼             ▼              ▼
//!  MeasurementSink  AlarmSink    Watchdog     DebugLink (optional)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use pico_sensors::subsystems::sensors::{SensorInputs, SensorOutputs, SensorsConfig, SensorsTask};
//!
//! static INPUTS: SensorInputs = SensorInputs::new();
//!
//! let task = SensorsTask::new(SensorsConfig::default(), EmbassyClock, gyro, accel, Some(mag));
//! task.run(&INPUTS, outputs).await
//! ```

pub mod accumulator;
pub mod bias;
pub mod calibration;
pub mod config;
pub mod conversion;
pub mod error;
pub mod io;
pub mod task;

pub use accumulator::SampleAccumulator;
pub use bias::GyroBiasFeedback;
pub use calibration::{CalibrationSet, CalibrationStore};
pub use config::SensorsConfig;
pub use conversion::{
    remap_axes, MagMeasurement, ScaledMeasurement, TemperatureTracker, TEMPERATURE_UNKNOWN,
};
pub use error::{ReadFailure, SensorsError};
pub use io::{MeasurementSink, RecordingSink, SensorInputs, SensorOutputs};
pub use task::{AcquisitionState, CycleOutcome, SensorsStats, SensorsTask};
