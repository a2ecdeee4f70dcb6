//! Sample source implementations
//!
//! Runtime-selected hardware variants of the [`SampleSource`] interface.
//!
//! ## Available Sources
//!
//! - `mock`: scripted source for testing (always available)
//! - `combined`: splits a shared gyro/accel FIFO (e.g. MPU-6000) into two
//!   per-class sources
//!
//! Chips with a separate FIFO or a single data register (BMA180, L3GD20,
//! HMC5883) implement [`SampleSource`] directly in the board crate.
//!
//! [`SampleSource`]: crate::devices::traits::SampleSource

pub mod combined;
pub mod mock;

pub use combined::{
    split, AccelBacklog, CombinedAccel, CombinedBatch, CombinedFifo, CombinedGyro, CombinedSample,
};
pub use mock::{MockSource, Step};
