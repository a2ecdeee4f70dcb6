//! Core infrastructure
//!
//! Logging macros and the platform seams (clock, alarms, watchdog) that the
//! subsystems are written against.

pub mod logging;
pub mod traits;
