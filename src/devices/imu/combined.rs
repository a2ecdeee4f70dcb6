//! Combined gyro + accel FIFO
//!
//! Chips such as the MPU-6000 push gyro and accel channels into one FIFO.
//! The acquisition loop still wants one [`SampleSource`] per sensor class, so
//! the chip driver is split into two halves:
//!
//! - [`CombinedGyro`] owns the FIFO. Draining it yields the gyro channels and
//!   parks the accel channels of the same records in an [`AccelBacklog`].
//! - [`CombinedAccel`] drains that backlog. It only ever sees records that
//!   the gyro half read, so both classes average the same set of samples as
//!   long as gyro is drained first in the cycle.
//!
//! ```ignore
//! static BACKLOG: AccelBacklog = AccelBacklog::new();
//!
//! let (gyro, accel) = split(mpu6000, &BACKLOG);
//! let task = SensorsTask::new(config, clock, gyro, accel, Some(mag));
//! ```

use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use crate::devices::traits::{
    BusError, BusMode, RawSample, ReadOutcome, SampleBatch, SampleSource, SensorClass,
    TemperatureModel, MAX_BATCH,
};

/// Accel records held between the gyro and accel drains of one cycle
const BACKLOG_LEN: usize = 2 * MAX_BATCH;

/// One record of a combined FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CombinedSample {
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
    pub temperature: Option<i16>,
}

/// Fixed-capacity buffer filled by [`CombinedFifo::read_fifo`]
pub type CombinedBatch = heapless::Vec<CombinedSample, MAX_BATCH>;

/// Bus driver for a chip with a shared gyro/accel FIFO
#[allow(async_fn_in_trait)]
pub trait CombinedFifo {
    fn gyro_scale(&self) -> f32;

    fn accel_scale(&self) -> f32;

    fn temperature_model(&self) -> Option<TemperatureModel> {
        None
    }

    async fn read_fifo(&mut self, out: &mut CombinedBatch) -> Result<ReadOutcome, BusError>;

    async fn force_read(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    async fn self_test(&mut self) -> Result<(), BusError>;
}

/// Accel records parked by [`CombinedGyro`] until [`CombinedAccel`] drains them
pub struct AccelBacklog {
    samples: Mutex<RefCell<heapless::Deque<RawSample, BACKLOG_LEN>>>,
    self_test: Mutex<Cell<Option<Result<(), BusError>>>>,
    dropped: Mutex<Cell<u32>>,
}

impl AccelBacklog {
    pub const fn new() -> Self {
        Self {
            samples: Mutex::new(RefCell::new(heapless::Deque::new())),
            self_test: Mutex::new(Cell::new(None)),
            dropped: Mutex::new(Cell::new(0)),
        }
    }

    fn push(&self, sample: RawSample) {
        critical_section::with(|cs| {
            let mut samples = self.samples.borrow_ref_mut(cs);
            if samples.is_full() {
                // Oldest record goes; accel was not drained last cycle
                samples.pop_front();
                let dropped = self.dropped.borrow(cs);
                dropped.set(dropped.get().saturating_add(1));
            }
            let _ = samples.push_back(sample);
        });
    }

    fn drain_into(&self, out: &mut SampleBatch) -> usize {
        critical_section::with(|cs| {
            let mut samples = self.samples.borrow_ref_mut(cs);
            while !out.is_full() {
                match samples.pop_front() {
                    Some(sample) => {
                        let _ = out.push(sample);
                    }
                    None => break,
                }
            }
            samples.len()
        })
    }

    /// Accel records discarded because the backlog overflowed
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }

    fn len(&self) -> usize {
        critical_section::with(|cs| self.samples.borrow_ref(cs).len())
    }

    /// Room for one more full chip read
    fn has_room_for_batch(&self) -> bool {
        BACKLOG_LEN - self.len() >= MAX_BATCH
    }

    /// No records waiting for the accel half
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AccelBacklog {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a combined FIFO driver into gyro and accel sources
pub fn split<F: CombinedFifo>(fifo: F, backlog: &AccelBacklog) -> (CombinedGyro<'_, F>, CombinedAccel<'_>) {
    let accel = CombinedAccel {
        backlog,
        scale: fifo.accel_scale(),
        temperature_model: fifo.temperature_model(),
    };
    let gyro = CombinedGyro {
        fifo,
        backlog,
        scratch: CombinedBatch::new(),
    };
    (gyro, accel)
}

/// Gyro half of a combined FIFO; owns the chip
pub struct CombinedGyro<'a, F> {
    fifo: F,
    backlog: &'a AccelBacklog,
    scratch: CombinedBatch,
}

impl<F> CombinedGyro<'_, F> {
    /// Access the underlying driver
    pub fn fifo_mut(&mut self) -> &mut F {
        &mut self.fifo
    }
}

impl<F: CombinedFifo> SampleSource for CombinedGyro<'_, F> {
    fn class(&self) -> SensorClass {
        SensorClass::Gyro
    }

    fn mode(&self) -> BusMode {
        BusMode::Fifo
    }

    fn scale(&self) -> f32 {
        self.fifo.gyro_scale()
    }

    fn temperature_model(&self) -> Option<TemperatureModel> {
        self.fifo.temperature_model()
    }

    /// Reads stop once the backlog cannot take another full batch. The
    /// remaining records stay in the chip for the next cycle, so the accel
    /// half always averages the same records as this half.
    async fn read_batch(&mut self, out: &mut SampleBatch) -> Result<ReadOutcome, BusError> {
        if !self.backlog.has_room_for_batch() {
            return Ok(ReadOutcome::Empty);
        }

        self.scratch.clear();
        let mut outcome = self.fifo.read_fifo(&mut self.scratch).await?;

        for record in &self.scratch {
            let gyro = RawSample {
                axes: record.gyro,
                temperature: record.temperature,
            };
            if out.push(gyro).is_err() {
                // Caller gave us a partly filled batch; never drop gyro silently
                return Err(BusError::FifoOverflow);
            }
            self.backlog.push(RawSample {
                axes: record.accel,
                temperature: record.temperature,
            });
        }

        if let ReadOutcome::Samples { more_pending: true } = outcome {
            if !self.backlog.has_room_for_batch() {
                outcome = ReadOutcome::Samples {
                    more_pending: false,
                };
            }
        }
        Ok(outcome)
    }

    async fn force_read(&mut self) -> Result<(), BusError> {
        self.fifo.force_read().await
    }

    async fn self_test(&mut self) -> Result<(), BusError> {
        let result = self.fifo.self_test().await;
        critical_section::with(|cs| self.backlog.self_test.borrow(cs).set(Some(result)));
        result
    }
}

/// Accel half of a combined FIFO
pub struct CombinedAccel<'a> {
    backlog: &'a AccelBacklog,
    scale: f32,
    temperature_model: Option<TemperatureModel>,
}

impl SampleSource for CombinedAccel<'_> {
    fn class(&self) -> SensorClass {
        SensorClass::Accel
    }

    fn mode(&self) -> BusMode {
        BusMode::Fifo
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn temperature_model(&self) -> Option<TemperatureModel> {
        self.temperature_model
    }

    async fn read_batch(&mut self, out: &mut SampleBatch) -> Result<ReadOutcome, BusError> {
        let before = out.len();
        let remaining = self.backlog.drain_into(out);
        if out.len() == before {
            return Ok(ReadOutcome::Empty);
        }
        Ok(ReadOutcome::Samples {
            more_pending: remaining > 0,
        })
    }

    async fn self_test(&mut self) -> Result<(), BusError> {
        // Same die as the gyro half, which must be tested first
        critical_section::with(|cs| self.backlog.self_test.borrow(cs).get())
            .unwrap_or(Err(BusError::SelfTestFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    struct FakeMpu {
        records: heapless::Deque<CombinedSample, 128>,
        self_test: Result<(), BusError>,
        forced: u32,
    }

    impl FakeMpu {
        fn with_records(records: &[CombinedSample]) -> Self {
            let mut deque = heapless::Deque::new();
            for r in records {
                deque.push_back(*r).unwrap();
            }
            Self {
                records: deque,
                self_test: Ok(()),
                forced: 0,
            }
        }
    }

    impl CombinedFifo for FakeMpu {
        fn gyro_scale(&self) -> f32 {
            0.5
        }

        fn accel_scale(&self) -> f32 {
            0.25
        }

        fn temperature_model(&self) -> Option<TemperatureModel> {
            Some(TemperatureModel::MPU6000)
        }

        async fn read_fifo(&mut self, out: &mut CombinedBatch) -> Result<ReadOutcome, BusError> {
            while !out.is_full() {
                match self.records.pop_front() {
                    Some(r) => out.push(r).unwrap(),
                    None => break,
                }
            }
            if out.is_empty() {
                Ok(ReadOutcome::Empty)
            } else {
                Ok(ReadOutcome::Samples {
                    more_pending: !self.records.is_empty(),
                })
            }
        }

        async fn force_read(&mut self) -> Result<(), BusError> {
            self.forced += 1;
            Ok(())
        }

        async fn self_test(&mut self) -> Result<(), BusError> {
            self.self_test
        }
    }

    fn record(g: i16, a: i16) -> CombinedSample {
        CombinedSample {
            gyro: [g, g, g],
            accel: [a, a, a],
            temperature: Some(-512),
        }
    }

    #[test]
    fn accel_half_sees_records_drained_by_gyro() {
        let backlog = AccelBacklog::new();
        let fifo = FakeMpu::with_records(&[record(1, 10), record(2, 20), record(3, 30)]);
        let (mut gyro, mut accel) = split(fifo, &backlog);

        let mut batch = SampleBatch::new();
        let outcome = block_on(accel.read_batch(&mut batch)).unwrap();
        assert_eq!(outcome, ReadOutcome::Empty);

        let outcome = block_on(gyro.read_batch(&mut batch)).unwrap();
        assert_eq!(outcome, ReadOutcome::Samples { more_pending: false });
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[1].axes, [2, 2, 2]);
        assert_eq!(backlog.len(), 3);

        batch.clear();
        let outcome = block_on(accel.read_batch(&mut batch)).unwrap();
        assert_eq!(outcome, ReadOutcome::Samples { more_pending: false });
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2].axes, [30, 30, 30]);
        assert_eq!(batch[2].temperature, Some(-512));
        assert!(backlog.is_empty());
    }

    #[test]
    fn halves_report_chip_scales_and_modes() {
        let backlog = AccelBacklog::new();
        let (gyro, accel) = split(FakeMpu::with_records(&[]), &backlog);

        assert_eq!(gyro.class(), SensorClass::Gyro);
        assert_eq!(accel.class(), SensorClass::Accel);
        assert_eq!(gyro.scale(), 0.5);
        assert_eq!(accel.scale(), 0.25);
        assert_eq!(gyro.mode(), BusMode::Fifo);
        assert_eq!(accel.temperature_model(), Some(TemperatureModel::MPU6000));
    }

    #[test]
    fn accel_self_test_mirrors_gyro_result() {
        let backlog = AccelBacklog::new();
        let mut fifo = FakeMpu::with_records(&[]);
        fifo.self_test = Err(BusError::SelfTestFailed);
        let (mut gyro, mut accel) = split(fifo, &backlog);

        // Untested chip counts as failed
        assert_eq!(block_on(accel.self_test()), Err(BusError::SelfTestFailed));

        assert_eq!(block_on(gyro.self_test()), Err(BusError::SelfTestFailed));
        assert_eq!(block_on(accel.self_test()), Err(BusError::SelfTestFailed));

        gyro.fifo_mut().self_test = Ok(());
        assert_eq!(block_on(gyro.self_test()), Ok(()));
        assert_eq!(block_on(accel.self_test()), Ok(()));
    }

    #[test]
    fn backlog_overflow_drops_oldest() {
        let backlog = AccelBacklog::new();
        for i in 0..(BACKLOG_LEN + 3) {
            backlog.push(RawSample::new([i as i16, 0, 0]));
        }
        assert_eq!(backlog.len(), BACKLOG_LEN);
        assert_eq!(backlog.dropped(), 3);

        let mut out = SampleBatch::new();
        backlog.drain_into(&mut out);
        assert_eq!(out[0].axes[0], 3);
    }

    #[test]
    fn gyro_half_leaves_records_on_chip_when_backlog_is_full() {
        let backlog = AccelBacklog::new();
        let records: heapless::Vec<CombinedSample, 80> =
            (0..80).map(|i| record(i as i16, i as i16)).collect();
        let (mut gyro, mut accel) = split(FakeMpu::with_records(&records), &backlog);

        let mut gyro_sum = 0i64;
        let mut gyro_count = 0;
        loop {
            let mut batch = SampleBatch::new();
            let outcome = block_on(gyro.read_batch(&mut batch)).unwrap();
            gyro_count += batch.len();
            gyro_sum += batch.iter().map(|s| i64::from(s.axes[0])).sum::<i64>();
            if outcome != (ReadOutcome::Samples { more_pending: true }) {
                break;
            }
        }
        assert_eq!(gyro_count, BACKLOG_LEN);

        // Backlog is full, the chip is left alone
        let mut batch = SampleBatch::new();
        assert_eq!(block_on(gyro.read_batch(&mut batch)).unwrap(), ReadOutcome::Empty);
        assert_eq!(gyro.fifo_mut().records.len(), 80 - BACKLOG_LEN);

        let mut accel_sum = 0i64;
        let mut accel_count = 0;
        loop {
            let mut batch = SampleBatch::new();
            let outcome = block_on(accel.read_batch(&mut batch)).unwrap();
            accel_count += batch.len();
            accel_sum += batch.iter().map(|s| i64::from(s.axes[0])).sum::<i64>();
            if outcome != (ReadOutcome::Samples { more_pending: true }) {
                break;
            }
        }
        assert_eq!(accel_count, gyro_count);
        assert_eq!(accel_sum, gyro_sum);
        assert_eq!(backlog.dropped(), 0);

        // Next cycle picks up the rest
        let mut batch = SampleBatch::new();
        let outcome = block_on(gyro.read_batch(&mut batch)).unwrap();
        assert_eq!(outcome, ReadOutcome::Samples { more_pending: false });
        assert_eq!(batch.len(), 80 - BACKLOG_LEN);
        assert_eq!(batch[0].axes[0], BACKLOG_LEN as i16);
    }

    #[test]
    fn force_read_reaches_chip() {
        let backlog = AccelBacklog::new();
        let (mut gyro, _accel) = split(FakeMpu::with_records(&[]), &backlog);
        block_on(gyro.force_read()).unwrap();
        assert_eq!(gyro.fifo_mut().forced, 1);
    }
}
