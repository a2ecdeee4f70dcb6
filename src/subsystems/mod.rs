//! Subsystems built on top of the device and core layers

pub mod sensors;
