//! Communication
//!
//! - `telemetry`: debug frame multiplexer for the auxiliary diagnostic link

pub mod telemetry;

pub use telemetry::{
    assemble, AuxRecords, BaroAltitude, DebugFrame, DebugLink, FrameError, GpsPosition,
    MockDebugLink, SinkError,
};
