//! Device traits
//!
//! Hardware-independent trait definitions for sensor bus drivers. These
//! traits enable:
//! - Unit testing with scripted mock sources
//! - One acquisition loop for every supported chip combination

pub mod sample_source;

pub use sample_source::{
    BusError, BusMode, ClassSet, RawSample, ReadOutcome, SampleBatch, SampleSource, SensorClass,
    TemperatureModel, MAX_BATCH,
};
