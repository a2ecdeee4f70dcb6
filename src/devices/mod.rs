//! Device drivers
//!
//! ## Modules
//!
//! - `imu`: sample source implementations (mock, combined FIFO)
//! - `traits`: device trait definitions (`SampleSource`, raw data types)

pub mod imu;
pub mod traits;
