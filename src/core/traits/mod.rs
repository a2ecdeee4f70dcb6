//! Core traits for platform-agnostic acquisition.
//!
//! These traits decouple the acquisition loop from the executor, the timer
//! driver and the health-monitoring collaborators.
//!
//! # Design
//!
//! - Trait definitions have no feature gates
//! - Mock implementations are always available for host testing
//! - `EmbassyClock` is available with the `embassy` feature

pub mod health;
pub mod time;

pub use health::{AlarmSeverity, AlarmSink, MockAlarms, MockWatchdog, SystemAlarm, Watchdog};
pub use time::{Clock, MockClock};

#[cfg(feature = "embassy")]
pub use time::EmbassyClock;
