//! Health signalling seams: the system alarm registry and the watchdog.
//!
//! Both collaborators live outside this crate. The acquisition task only
//! raises/clears its own named alarm and kicks its own watchdog flag.

use core::fmt;

/// Named alarms owned by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemAlarm {
    /// Inertial sensor acquisition
    Sensors,
}

/// Alarm severity, ordered from healthy to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSeverity {
    /// Alarm cleared
    #[default]
    None,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlarmSeverity::None => "none",
            AlarmSeverity::Warning => "warning",
            AlarmSeverity::Error => "error",
            AlarmSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// System alarm registry.
pub trait AlarmSink {
    /// Set `alarm` to `severity`.
    fn set(&mut self, alarm: SystemAlarm, severity: AlarmSeverity);

    /// Clear `alarm`.
    fn clear(&mut self, alarm: SystemAlarm) {
        self.set(alarm, AlarmSeverity::None);
    }
}

/// Liveness watchdog.
pub trait Watchdog {
    /// Signal that the acquisition loop is alive.
    fn kick(&mut self);
}

// ============================================================================
// Mock Implementations (always available for testing)
// ============================================================================

/// Alarm registry that records the current severity and how often it
/// transitioned into `Critical`.
#[derive(Debug, Default)]
pub struct MockAlarms {
    severity: AlarmSeverity,
    critical_transitions: u32,
    set_calls: u32,
}

impl MockAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current severity of the sensors alarm.
    pub fn severity(&self) -> AlarmSeverity {
        self.severity
    }

    /// Number of times the alarm went from non-critical to critical.
    pub fn critical_transitions(&self) -> u32 {
        self.critical_transitions
    }

    /// Total number of `set`/`clear` calls.
    pub fn set_calls(&self) -> u32 {
        self.set_calls
    }
}

impl AlarmSink for MockAlarms {
    fn set(&mut self, _alarm: SystemAlarm, severity: AlarmSeverity) {
        self.set_calls += 1;
        if severity == AlarmSeverity::Critical && self.severity != AlarmSeverity::Critical {
            self.critical_transitions += 1;
        }
        self.severity = severity;
    }
}

/// Watchdog that counts kicks.
#[derive(Debug, Default)]
pub struct MockWatchdog {
    kicks: u32,
}

impl MockWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kicks(&self) -> u32 {
        self.kicks
    }
}

impl Watchdog for MockWatchdog {
    fn kick(&mut self) {
        self.kicks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(AlarmSeverity::None < AlarmSeverity::Warning);
        assert!(AlarmSeverity::Error < AlarmSeverity::Critical);
        assert_eq!(AlarmSeverity::default(), AlarmSeverity::None);
    }

    #[test]
    fn mock_alarms_counts_critical_transitions_once() {
        let mut alarms = MockAlarms::new();
        alarms.set(SystemAlarm::Sensors, AlarmSeverity::Critical);
        alarms.set(SystemAlarm::Sensors, AlarmSeverity::Critical);
        assert_eq!(alarms.critical_transitions(), 1);

        alarms.clear(SystemAlarm::Sensors);
        assert_eq!(alarms.severity(), AlarmSeverity::None);

        alarms.set(SystemAlarm::Sensors, AlarmSeverity::Critical);
        assert_eq!(alarms.critical_transitions(), 2);
        assert_eq!(alarms.set_calls(), 4);
    }

    #[test]
    fn mock_watchdog_counts_kicks() {
        let mut wdg = MockWatchdog::new();
        wdg.kick();
        wdg.kick();
        assert_eq!(wdg.kicks(), 2);
    }
}
