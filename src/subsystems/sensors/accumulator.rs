//! Per-cycle raw sample accumulation
//!
//! Sums raw counts per axis (plus the die temperature code) for one sensor
//! class over one acquisition cycle. A FIFO chip may deliver several samples
//! per cycle; their mean is what gets published.

use nalgebra::Vector3;

use crate::devices::traits::RawSample;

/// Integer sums and counts for one sensor class and one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleAccumulator {
    sum: [i64; 3],
    count: u32,
    temperature_sum: i64,
    temperature_count: u32,
}

impl SampleAccumulator {
    pub const fn new() -> Self {
        Self {
            sum: [0; 3],
            count: 0,
            temperature_sum: 0,
            temperature_count: 0,
        }
    }

    pub fn add(&mut self, sample: &RawSample) {
        for (sum, axis) in self.sum.iter_mut().zip(sample.axes) {
            *sum += i64::from(axis);
        }
        self.count += 1;

        if let Some(code) = sample.temperature {
            self.temperature_sum += i64::from(code);
            self.temperature_count += 1;
        }
    }

    pub fn extend(&mut self, samples: &[RawSample]) {
        for sample in samples {
            self.add(sample);
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// No samples this cycle
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Per-axis mean in sensor axes, `None` when no samples arrived
    pub fn mean(&self) -> Option<Vector3<f32>> {
        if self.count == 0 {
            return None;
        }
        let n = f64::from(self.count);
        Some(Vector3::new(
            (self.sum[0] as f64 / n) as f32,
            (self.sum[1] as f64 / n) as f32,
            (self.sum[2] as f64 / n) as f32,
        ))
    }

    /// Mean raw temperature code over samples that carried one
    pub fn mean_temperature_code(&self) -> Option<f32> {
        if self.temperature_count == 0 {
            return None;
        }
        Some((self.temperature_sum as f64 / f64::from(self.temperature_count)) as f32)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
