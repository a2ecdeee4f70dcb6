//! Gyro bias feedback from the attitude estimator
//!
//! The estimator publishes its running gyro bias estimate here; the
//! acquisition loop adds it to every gyro measurement while correction is
//! enabled.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use nalgebra::Vector3;

/// Externally supplied gyro bias estimate plus the enable flag
pub struct GyroBiasFeedback {
    estimate: Mutex<Cell<Vector3<f32>>>,
    enabled: AtomicBool,
}

impl GyroBiasFeedback {
    pub const fn new(enabled: bool) -> Self {
        Self {
            estimate: Mutex::new(Cell::new(Vector3::new(0.0, 0.0, 0.0))),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Replace the estimate (rad/s, body frame)
    pub fn set_estimate(&self, bias: Vector3<f32>) {
        critical_section::with(|cs| self.estimate.borrow(cs).set(bias));
    }

    pub fn estimate(&self) -> Vector3<f32> {
        critical_section::with(|cs| self.estimate.borrow(cs).get())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Estimate to add this cycle, `None` while correction is disabled
    pub fn correction(&self) -> Option<Vector3<f32>> {
        self.is_enabled().then(|| self.estimate())
    }
}

impl Default for GyroBiasFeedback {
    fn default() -> Self {
        Self::new(true)
    }
}
