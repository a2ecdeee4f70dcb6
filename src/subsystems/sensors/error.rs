//! Acquisition error types

use core::fmt;

use crate::devices::traits::{BusError, SensorClass};

/// Errors that stop the acquisition task from starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorsError {
    /// A sensor failed its startup self-test
    SelfTestFailed {
        class: SensorClass,
        cause: BusError,
    },

    /// A source was wired to the wrong sensor class
    ClassMismatch {
        expected: SensorClass,
        actual: SensorClass,
    },

    /// Configuration values are inconsistent
    InvalidConfig {
        reason: &'static str,
    },
}

impl fmt::Display for SensorsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorsError::SelfTestFailed { class, cause } => {
                write!(f, "{} self-test failed: {}", class, cause)
            }
            SensorsError::ClassMismatch { expected, actual } => {
                write!(f, "expected {} source, got {}", expected, actual)
            }
            SensorsError::InvalidConfig { reason } => {
                write!(f, "invalid sensors configuration: {}", reason)
            }
        }
    }
}

/// Why one sensor class failed to deliver a reading this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadFailure {
    /// No sample within the cycle budget
    Timeout,

    /// The bus reported an error
    Bus(BusError),
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFailure::Timeout => write!(f, "timeout"),
            ReadFailure::Bus(e) => write!(f, "{}", e),
        }
    }
}
