//! Debug telemetry multiplexer
//!
//! Packs one acquisition cycle into a single framed buffer for a diagnostic
//! serial link. Sources run at different rates, so optional blocks are tagged
//! and only present when new data arrived since the previous frame.
//!
//! # Wire format
//!
//! ```text
//! [0xFF][ts_hi][ts_lo]                      header, ts = cycle start ms (low 16 bits)
//! [accel x,y,z: f32]                        12 bytes
//! [gyro x,y,z,temperature: f32]             16 bytes
//! [0x01][mag x,y,z: f32]                    optional, 13 bytes
//! [0x02][gps position]                      optional, 1 + 38 bytes
//! [0x03][baro altitude]                     optional, 1 + 12 bytes
//! ```
//!
//! Floats are little-endian IEEE-754. Tagged blocks always appear in the order
//! above; a reader derives each block length from its tag.
//!
//! # Buffer Management
//!
//! - Frame buffer: 128 bytes (heapless::Vec for no_std), enough for every
//!   optional block at once
//! - The frame is offered to the link with one non-blocking write; if the
//!   link is backed up the whole frame is dropped

use core::cell::Cell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use heapless::Vec;

use crate::subsystems::sensors::{MagMeasurement, ScaledMeasurement};

/// Frame sync byte
pub const SYNC_BYTE: u8 = 0xFF;

/// Tag preceding a magnetometer block
pub const TAG_MAG: u8 = 0x01;

/// Tag preceding a GPS position block
pub const TAG_GPS: u8 = 0x02;

/// Tag preceding a barometric altitude block
pub const TAG_BARO: u8 = 0x03;

/// Header length (sync + 16-bit timestamp)
pub const HEADER_LEN: usize = 3;

/// Accel block length
pub const ACCEL_LEN: usize = 12;

/// Gyro block length (with temperature)
pub const GYRO_LEN: usize = 16;

/// Mag block payload length
pub const MAG_LEN: usize = 12;

/// Maximum frame size
pub const FRAME_CAPACITY: usize = 128;

/// GPS position record as carried in the debug frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsPosition {
    /// Latitude, degrees × 1e7
    pub latitude: i32,
    /// Longitude, degrees × 1e7
    pub longitude: i32,
    /// Altitude above MSL, m
    pub altitude: f32,
    /// Geoid separation, m
    pub geoid_separation: f32,
    /// Course over ground, degrees
    pub heading: f32,
    /// Ground speed, m/s
    pub groundspeed: f32,
    pub pdop: f32,
    pub hdop: f32,
    pub vdop: f32,
    /// Fix status code
    pub status: u8,
    pub satellites: i8,
}

impl GpsPosition {
    /// Packed wire size
    pub const WIRE_LEN: usize = 38;

    pub const fn zeroed() -> Self {
        Self {
            latitude: 0,
            longitude: 0,
            altitude: 0.0,
            geoid_separation: 0.0,
            heading: 0.0,
            groundspeed: 0.0,
            pdop: 0.0,
            hdop: 0.0,
            vdop: 0.0,
            status: 0,
            satellites: 0,
        }
    }

    fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), FrameError> {
        put(out, &self.latitude.to_le_bytes())?;
        put(out, &self.longitude.to_le_bytes())?;
        for value in [
            self.altitude,
            self.geoid_separation,
            self.heading,
            self.groundspeed,
            self.pdop,
            self.hdop,
            self.vdop,
        ] {
            put(out, &value.to_le_bytes())?;
        }
        put(out, &[self.status, self.satellites as u8])
    }
}

/// Barometric altitude record as carried in the debug frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaroAltitude {
    /// m
    pub altitude: f32,
    /// °C
    pub temperature: f32,
    /// kPa
    pub pressure: f32,
}

impl BaroAltitude {
    /// Packed wire size
    pub const WIRE_LEN: usize = 12;

    pub const fn zeroed() -> Self {
        Self {
            altitude: 0.0,
            temperature: 0.0,
            pressure: 0.0,
        }
    }

    fn encode<const N: usize>(&self, out: &mut Vec<u8, N>) -> Result<(), FrameError> {
        put_f32s(out, &[self.altitude, self.temperature, self.pressure])
    }
}

/// GPS and baro records plus their "updated since last frame" flags
///
/// Producers call `publish_*` (or `mark_*_updated` when the record itself
/// lives elsewhere and was already refreshed). Only the acquisition loop
/// clears a flag, when it copies the record into a frame. A flag tracks "new
/// data since the last frame", not how many updates arrived.
pub struct AuxRecords {
    gps: Mutex<Cell<GpsPosition>>,
    gps_updated: AtomicBool,
    baro: Mutex<Cell<BaroAltitude>>,
    baro_updated: AtomicBool,
}

impl AuxRecords {
    pub const fn new() -> Self {
        Self {
            gps: Mutex::new(Cell::new(GpsPosition::zeroed())),
            gps_updated: AtomicBool::new(false),
            baro: Mutex::new(Cell::new(BaroAltitude::zeroed())),
            baro_updated: AtomicBool::new(false),
        }
    }

    /// Store a new GPS record and flag it for the next frame
    pub fn publish_gps(&self, position: GpsPosition) {
        critical_section::with(|cs| self.gps.borrow(cs).set(position));
        self.mark_gps_updated();
    }

    /// Store a new baro record and flag it for the next frame
    pub fn publish_baro(&self, altitude: BaroAltitude) {
        critical_section::with(|cs| self.baro.borrow(cs).set(altitude));
        self.mark_baro_updated();
    }

    pub fn mark_gps_updated(&self) {
        self.gps_updated.store(true, Ordering::Release);
    }

    pub fn mark_baro_updated(&self) {
        self.baro_updated.store(true, Ordering::Release);
    }

    pub fn gps_pending(&self) -> bool {
        self.gps_updated.load(Ordering::Acquire)
    }

    pub fn baro_pending(&self) -> bool {
        self.baro_updated.load(Ordering::Acquire)
    }

    /// Consume the GPS flag, returning the record if it was set
    pub fn take_gps(&self) -> Option<GpsPosition> {
        self.gps_updated
            .swap(false, Ordering::AcqRel)
            .then(|| critical_section::with(|cs| self.gps.borrow(cs).get()))
    }

    /// Consume the baro flag, returning the record if it was set
    pub fn take_baro(&self) -> Option<BaroAltitude> {
        self.baro_updated
            .swap(false, Ordering::AcqRel)
            .then(|| critical_section::with(|cs| self.baro.borrow(cs).get()))
    }
}

impl Default for AuxRecords {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame assembly errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Frame would exceed [`FRAME_CAPACITY`]
    Overflow,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Overflow => write!(f, "debug frame overflow"),
        }
    }
}

/// Diagnostic link errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SinkError {
    /// Not enough room for the whole frame; nothing was written
    Busy,
}

/// Best-effort diagnostic byte sink (e.g. an auxiliary UART)
pub trait DebugLink {
    /// Write `frame` completely or not at all, without blocking
    fn try_send(&mut self, frame: &[u8]) -> Result<(), SinkError>;
}

/// One assembled debug frame
#[derive(Debug, Clone, PartialEq)]
pub struct DebugFrame {
    bytes: Vec<u8, FRAME_CAPACITY>,
}

impl DebugFrame {
    /// Start a frame with the sync byte and a big-endian 16-bit timestamp
    pub fn new(timestamp_ms: u64) -> Self {
        let ts = (timestamp_ms & 0xFFFF) as u16;
        let mut bytes = Vec::new();
        // Cannot fail: capacity is far above the header length
        let _ = bytes.extend_from_slice(&[SYNC_BYTE, (ts >> 8) as u8, (ts & 0xFF) as u8]);
        Self { bytes }
    }

    pub fn push_accel(&mut self, accel: &ScaledMeasurement) -> Result<(), FrameError> {
        put_f32s(&mut self.bytes, &[accel.x, accel.y, accel.z])
    }

    pub fn push_gyro(&mut self, gyro: &ScaledMeasurement) -> Result<(), FrameError> {
        put_f32s(&mut self.bytes, &[gyro.x, gyro.y, gyro.z, gyro.temperature])
    }

    pub fn push_mag(&mut self, mag: &MagMeasurement) -> Result<(), FrameError> {
        put(&mut self.bytes, &[TAG_MAG])?;
        put_f32s(&mut self.bytes, &[mag.x, mag.y, mag.z])
    }

    pub fn push_gps(&mut self, gps: &GpsPosition) -> Result<(), FrameError> {
        put(&mut self.bytes, &[TAG_GPS])?;
        gps.encode(&mut self.bytes)
    }

    pub fn push_baro(&mut self, baro: &BaroAltitude) -> Result<(), FrameError> {
        put(&mut self.bytes, &[TAG_BARO])?;
        baro.encode(&mut self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build the frame for one cycle
///
/// Consumes the GPS/baro flags of `aux` that were set.
pub fn assemble(
    timestamp_ms: u64,
    accel: &ScaledMeasurement,
    gyro: &ScaledMeasurement,
    mag: Option<&MagMeasurement>,
    aux: &AuxRecords,
) -> Result<DebugFrame, FrameError> {
    let mut frame = DebugFrame::new(timestamp_ms);
    frame.push_accel(accel)?;
    frame.push_gyro(gyro)?;
    if let Some(mag) = mag {
        frame.push_mag(mag)?;
    }
    if let Some(gps) = aux.take_gps() {
        frame.push_gps(&gps)?;
    }
    if let Some(baro) = aux.take_baro() {
        frame.push_baro(&baro)?;
    }
    Ok(frame)
}

fn put<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), FrameError> {
    out.extend_from_slice(bytes).map_err(|_| FrameError::Overflow)
}

fn put_f32s<const N: usize>(out: &mut Vec<u8, N>, values: &[f32]) -> Result<(), FrameError> {
    for value in values {
        put(out, &value.to_le_bytes())?;
    }
    Ok(())
}

// ============================================================================
// Mock Implementation (always available for testing)
// ============================================================================

/// Debug link that keeps the last frame it accepted
#[derive(Debug, Default)]
pub struct MockDebugLink {
    last_frame: Vec<u8, FRAME_CAPACITY>,
    busy: bool,
    sent: u32,
    rejected: u32,
}

impl MockDebugLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backed-up link
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn last_frame(&self) -> &[u8] {
        &self.last_frame
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }
}

impl DebugLink for MockDebugLink {
    fn try_send(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        if self.busy {
            self.rejected += 1;
            return Err(SinkError::Busy);
        }
        self.last_frame.clear();
        self.last_frame
            .extend_from_slice(frame)
            .map_err(|_| SinkError::Busy)?;
        self.sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn f32_at(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn accel() -> ScaledMeasurement {
        ScaledMeasurement::new(Vector3::new(1.0, 1.0, 1.0), 25.0)
    }

    fn gyro() -> ScaledMeasurement {
        ScaledMeasurement::new(Vector3::new(2.0, 2.0, 2.0), 30.0)
    }

    #[test]
    fn frame_without_optional_blocks() {
        let aux = AuxRecords::new();
        let frame = assemble(0x1234, &accel(), &gyro(), None, &aux).unwrap();
        let bytes = frame.as_bytes();

        assert_eq!(bytes.len(), HEADER_LEN + ACCEL_LEN + GYRO_LEN);
        assert_eq!(&bytes[..3], &[0xFF, 0x12, 0x34]);
        for i in 0..3 {
            assert_eq!(f32_at(bytes, 3 + 4 * i), 1.0);
            assert_eq!(f32_at(bytes, 15 + 4 * i), 2.0);
        }
        assert_eq!(f32_at(bytes, 27), 30.0);
    }

    #[test]
    fn timestamp_keeps_low_16_bits() {
        let frame = DebugFrame::new(0x0012_ABCD);
        assert_eq!(frame.as_bytes(), &[0xFF, 0xAB, 0xCD]);
    }

    #[test]
    fn all_blocks_in_fixed_order() {
        let aux = AuxRecords::new();
        aux.publish_baro(BaroAltitude {
            altitude: 100.0,
            temperature: 20.0,
            pressure: 101.3,
        });
        aux.publish_gps(GpsPosition {
            latitude: 354_000_000,
            longitude: -1_390_000_000,
            satellites: 9,
            status: 3,
            ..Default::default()
        });
        let mag = MagMeasurement::new(Vector3::new(-1.0, 0.5, 4.0));

        let frame = assemble(0, &accel(), &gyro(), Some(&mag), &aux).unwrap();
        let bytes = frame.as_bytes();

        let mag_at = HEADER_LEN + ACCEL_LEN + GYRO_LEN;
        assert_eq!(bytes[mag_at], TAG_MAG);
        assert_eq!(f32_at(bytes, mag_at + 1), -1.0);
        assert_eq!(f32_at(bytes, mag_at + 9), 4.0);

        let gps_at = mag_at + 1 + MAG_LEN;
        assert_eq!(bytes[gps_at], TAG_GPS);
        assert_eq!(
            i32::from_le_bytes(bytes[gps_at + 1..gps_at + 5].try_into().unwrap()),
            354_000_000
        );
        assert_eq!(bytes[gps_at + GpsPosition::WIRE_LEN - 1], 3);
        assert_eq!(bytes[gps_at + GpsPosition::WIRE_LEN], 9);

        let baro_at = gps_at + 1 + GpsPosition::WIRE_LEN;
        assert_eq!(bytes[baro_at], TAG_BARO);
        assert_eq!(f32_at(bytes, baro_at + 1), 100.0);
        assert_eq!(bytes.len(), baro_at + 1 + BaroAltitude::WIRE_LEN);
        assert!(bytes.len() <= FRAME_CAPACITY);
    }

    #[test]
    fn flags_are_consumed_by_one_frame() {
        let aux = AuxRecords::new();
        aux.publish_gps(GpsPosition::default());
        assert!(aux.gps_pending());

        let first = assemble(0, &accel(), &gyro(), None, &aux).unwrap();
        assert_eq!(first.len(), HEADER_LEN + ACCEL_LEN + GYRO_LEN + 1 + GpsPosition::WIRE_LEN);
        assert!(!aux.gps_pending());

        let second = assemble(2, &accel(), &gyro(), None, &aux).unwrap();
        assert_eq!(second.len(), HEADER_LEN + ACCEL_LEN + GYRO_LEN);
    }

    #[test]
    fn mark_updated_reuses_stored_record() {
        let aux = AuxRecords::new();
        let baro = BaroAltitude {
            altitude: 12.5,
            ..Default::default()
        };
        aux.publish_baro(baro);
        assert_eq!(aux.take_baro(), Some(baro));
        assert_eq!(aux.take_baro(), None);

        aux.mark_baro_updated();
        assert_eq!(aux.take_baro(), Some(baro));
    }

    #[test]
    fn busy_link_rejects_whole_frame() {
        let mut link = MockDebugLink::new();
        link.set_busy(true);
        assert_eq!(link.try_send(&[1, 2, 3]), Err(SinkError::Busy));
        assert!(link.last_frame().is_empty());
        assert_eq!(link.rejected(), 1);

        link.set_busy(false);
        link.try_send(&[4, 5]).unwrap();
        assert_eq!(link.last_frame(), &[4, 5]);
        assert_eq!(link.sent(), 1);
    }
}
