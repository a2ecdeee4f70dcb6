//! Bus Sample Source Trait and Raw Data Types
//!
//! Hardware-independent view of one sensor class on the bus. A driver hides
//! whether the chip has a FIFO or a single data register; the acquisition
//! loop only sees batches of raw samples, an empty indication, or an error.
//!
//! ## Usage
//!
//! ```ignore
//! use pico_sensors::devices::traits::{SampleBatch, SampleSource, ReadOutcome};
//!
//! async fn drain<S: SampleSource>(source: &mut S) -> Result<usize, BusError> {
//!     let mut batch = SampleBatch::new();
//!     let mut total = 0;
//!     while let ReadOutcome::Samples { more_pending } = source.read_batch(&mut batch).await? {
//!         total += batch.len();
//!         batch.clear();
//!         if !more_pending {
//!             break;
//!         }
//!     }
//!     Ok(total)
//! }
//! ```

use core::fmt;

/// Maximum number of raw samples returned by one `read_batch` call
pub const MAX_BATCH: usize = 32;

/// Fixed-capacity buffer filled by `read_batch`
pub type SampleBatch = heapless::Vec<RawSample, MAX_BATCH>;

/// Sensor class handled by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorClass {
    Gyro,
    Accel,
    Mag,
}

impl SensorClass {
    /// Bit used in [`ClassSet`]
    const fn bit(self) -> u8 {
        match self {
            SensorClass::Gyro => 0b001,
            SensorClass::Accel => 0b010,
            SensorClass::Mag => 0b100,
        }
    }
}

impl fmt::Display for SensorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorClass::Gyro => "gyro",
            SensorClass::Accel => "accel",
            SensorClass::Mag => "mag",
        };
        f.write_str(s)
    }
}

/// Small set of sensor classes (e.g. the classes that failed this cycle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClassSet(u8);

impl ClassSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, class: SensorClass) {
        self.0 |= class.bit();
    }

    pub const fn contains(&self, class: SensorClass) -> bool {
        self.0 & class.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn len(&self) -> u32 {
        self.0.count_ones()
    }
}

/// Sampling strategy of a source, chosen by the driver at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusMode {
    /// Hardware queue: wait for the first sample, then drain until empty
    Fifo,
    /// Data register: at most one sample, read once per cycle
    SingleSample,
}

/// One raw reading in sensor axes and counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// X, Y, Z in the chip's own axis order
    pub axes: [i16; 3],

    /// Raw die temperature code, if the chip reports one with this sample
    pub temperature: Option<i16>,
}

impl RawSample {
    pub const fn new(axes: [i16; 3]) -> Self {
        Self {
            axes,
            temperature: None,
        }
    }

    pub const fn with_temperature(axes: [i16; 3], temperature: i16) -> Self {
        Self {
            axes,
            temperature: Some(temperature),
        }
    }
}

/// Result of a successful `read_batch` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadOutcome {
    /// Samples were appended to the batch
    Samples {
        /// The hardware queue still holds unread samples
        more_pending: bool,
    },

    /// No new data available
    Empty,
}

/// Bus-level failures reported by a sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// I2C/SPI transfer failed
    Transfer,

    /// FIFO overflowed and its contents were discarded
    FifoOverflow,

    /// Sensor self-test failed
    SelfTestFailed,

    /// Identity register did not match the expected chip
    InvalidDevice,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Transfer => write!(f, "bus transfer failed"),
            BusError::FifoOverflow => write!(f, "FIFO overflow"),
            BusError::SelfTestFailed => write!(f, "self-test failed"),
            BusError::InvalidDevice => write!(f, "unexpected device identity"),
        }
    }
}

/// Linear die-temperature conversion
///
/// ```text
/// celsius = offset_c + (code + code_offset) / lsb_per_c
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureModel {
    pub offset_c: f32,
    pub code_offset: f32,
    pub lsb_per_c: f32,
}

impl TemperatureModel {
    /// MPU-6000 gyro/accel die sensor
    pub const MPU6000: Self = Self {
        offset_c: 35.0,
        code_offset: 512.0,
        lsb_per_c: 340.0,
    };

    /// BMA180 accelerometer die sensor
    pub const BMA180: Self = Self {
        offset_c: 25.0,
        code_offset: -2.0,
        lsb_per_c: 2.0,
    };

    /// Convert a (possibly averaged) raw code to °C
    pub fn celsius(&self, code: f32) -> f32 {
        self.offset_c + (code + self.code_offset) / self.lsb_per_c
    }
}

/// Device-independent sample source for one sensor class
///
/// Two behavioural variants share this interface (see [`BusMode`]):
/// - `Fifo`: repeated `read_batch` calls drain a hardware queue
/// - `SingleSample`: `read_batch` yields at most one sample per call
#[allow(async_fn_in_trait)]
pub trait SampleSource {
    /// Sensor class this source provides
    fn class(&self) -> SensorClass;

    /// Sampling strategy
    fn mode(&self) -> BusMode;

    /// Physical units per LSB (rad/s, m/s², or 1.0 for raw-unit sensors)
    fn scale(&self) -> f32;

    /// Die temperature conversion, `None` if the chip reports no temperature
    fn temperature_model(&self) -> Option<TemperatureModel> {
        None
    }

    /// Append the next samples to `out`
    ///
    /// Must not block beyond a single bus transaction. If `out` fills up,
    /// return `Samples { more_pending: true }` and keep the rest queued.
    async fn read_batch(&mut self, out: &mut SampleBatch) -> Result<ReadOutcome, BusError>;

    /// Forced blocking read used to restart a FIFO that stopped raising
    /// data-ready interrupts after a missed read
    async fn force_read(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    /// Run the chip self-test (called once at startup)
    async fn self_test(&mut self) -> Result<(), BusError>;
}
