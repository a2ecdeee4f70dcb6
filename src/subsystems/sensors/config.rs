//! Acquisition task configuration

use super::error::SensorsError;

/// Acquisition task configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorsConfig {
    /// Cycle period in microseconds (default: 2000 = 500 Hz)
    pub period_us: u32,

    /// Time allowed for a FIFO source to produce its first sample, measured
    /// from the start of the cycle (default: one period)
    pub cycle_budget_us: u32,

    /// Delay between polls of an empty FIFO (default: 50)
    pub poll_interval_us: u32,

    /// Watchdog kick interval while halted after a failed self-test
    /// (default: 10000)
    pub halt_kick_interval_us: u32,

    /// Initial state of gyro bias correction (default: true)
    pub bias_correct_gyro: bool,

    /// Treat a magnetometer read error as a failed cycle (default: false)
    pub mag_required: bool,

    /// Build debug frames when a diagnostic link is attached (default: true)
    pub telemetry_enabled: bool,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            period_us: 2_000,
            cycle_budget_us: 2_000,
            poll_interval_us: 50,
            halt_kick_interval_us: 10_000,
            bias_correct_gyro: true,
            mag_required: false,
            telemetry_enabled: true,
        }
    }
}

impl SensorsConfig {
    /// Cycle rate in Hz
    pub const fn rate_hz(&self) -> u32 {
        1_000_000 / self.period_us
    }

    pub fn validate(&self) -> Result<(), SensorsError> {
        if self.period_us == 0 {
            return Err(SensorsError::InvalidConfig {
                reason: "period must be non-zero",
            });
        }
        if self.cycle_budget_us == 0 || self.cycle_budget_us > self.period_us {
            return Err(SensorsError::InvalidConfig {
                reason: "cycle budget must be within one period",
            });
        }
        if self.poll_interval_us == 0 || self.poll_interval_us >= self.cycle_budget_us {
            return Err(SensorsError::InvalidConfig {
                reason: "poll interval must be shorter than the cycle budget",
            });
        }
        if self.halt_kick_interval_us == 0 {
            return Err(SensorsError::InvalidConfig {
                reason: "halt kick interval must be non-zero",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_500hz() {
        let config = SensorsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_hz(), 500);
    }

    #[test]
    fn zero_period_rejected() {
        let config = SensorsConfig {
            period_us: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn budget_longer_than_period_rejected() {
        let config = SensorsConfig {
            cycle_budget_us: 2_500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn poll_interval_must_fit_budget() {
        let config = SensorsConfig {
            poll_interval_us: 2_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SensorsConfig {
            poll_interval_us: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn halt_kick_interval_must_be_non_zero() {
        let config = SensorsConfig {
            halt_kick_interval_us: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
