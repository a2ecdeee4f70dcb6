#![cfg_attr(not(test), no_std)]

//! pico_sensors - Inertial sensor acquisition for Raspberry Pi Pico flight controllers
//!
//! Reads gyroscope, accelerometer and optional magnetometer samples on a
//! fixed period, averages and calibrates them, and publishes body-frame
//! measurements plus an optional binary debug stream.

// Core infrastructure: logging and platform seams (clock, alarms, watchdog)
pub mod core;

// Sensor sources and the device-independent sample interface
pub mod devices;

// Acquisition subsystem
pub mod subsystems;

// Debug telemetry framing
pub mod communication;
