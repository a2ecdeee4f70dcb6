//! Scripted sample source for testing
//!
//! Each call to `read_batch` consumes one scripted step. When the script runs
//! out the source reports `Empty`, which makes a FIFO source look like a chip
//! that stopped raising data-ready interrupts.
//!
//! ## Usage
//!
//! ```ignore
//! use pico_sensors::devices::imu::MockSource;
//! use pico_sensors::devices::traits::{BusMode, RawSample, SensorClass};
//!
//! let mut gyro = MockSource::new(SensorClass::Gyro, BusMode::Fifo, 0.01);
//! gyro.push_cycle(&[RawSample::new([10, 20, 30]); 4]);
//! ```

use crate::devices::traits::{
    BusError, BusMode, RawSample, ReadOutcome, SampleBatch, SampleSource, SensorClass,
    TemperatureModel, MAX_BATCH,
};

/// Maximum number of scripted steps
const SCRIPT_LEN: usize = 64;

/// One scripted `read_batch` response
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Samples {
        samples: SampleBatch,
        more_pending: bool,
    },
    Empty,
    Error(BusError),
}

/// Scripted sample source
pub struct MockSource {
    class: SensorClass,
    mode: BusMode,
    scale: f32,
    temperature_model: Option<TemperatureModel>,

    /// Queue of responses to return
    script: heapless::Deque<Step, SCRIPT_LEN>,

    /// Result returned by `self_test`
    self_test_result: Result<(), BusError>,

    reads: u32,
    forced_reads: u32,
}

impl MockSource {
    /// Create a source with an empty script
    pub fn new(class: SensorClass, mode: BusMode, scale: f32) -> Self {
        Self {
            class,
            mode,
            scale,
            temperature_model: None,
            script: heapless::Deque::new(),
            self_test_result: Ok(()),
            reads: 0,
            forced_reads: 0,
        }
    }

    /// Report die temperature using `model`
    pub fn with_temperature_model(mut self, model: TemperatureModel) -> Self {
        self.temperature_model = Some(model);
        self
    }

    /// Make `self_test` fail with `error`
    pub fn fail_self_test(&mut self, error: BusError) {
        self.self_test_result = Err(error);
    }

    /// Script the samples one acquisition cycle will see
    ///
    /// FIFO sources get the samples split into batches of at most
    /// [`MAX_BATCH`]. Single-sample sources get one step per sample, so a
    /// cycle reads only the first and the rest carry over to later cycles.
    /// An empty slice scripts an `Empty` response.
    pub fn push_cycle(&mut self, samples: &[RawSample]) {
        if samples.is_empty() {
            self.push_step(Step::Empty);
            return;
        }

        let chunk_len = match self.mode {
            BusMode::Fifo => MAX_BATCH,
            BusMode::SingleSample => 1,
        };

        let mut chunks = samples.chunks(chunk_len).peekable();
        while let Some(chunk) = chunks.next() {
            let mut batch = SampleBatch::new();
            let _ = batch.extend_from_slice(chunk);
            let more_pending = self.mode == BusMode::Fifo && chunks.peek().is_some();
            self.push_step(Step::Samples {
                samples: batch,
                more_pending,
            });
        }
    }

    /// Script an `Empty` response
    pub fn push_empty(&mut self) {
        self.push_step(Step::Empty);
    }

    /// Script a bus error
    pub fn push_error(&mut self, error: BusError) {
        self.push_step(Step::Error(error));
    }

    fn push_step(&mut self, step: Step) {
        // Tests never script more than SCRIPT_LEN steps ahead; drop if they do
        let _ = self.script.push_back(step);
    }

    /// Number of scripted steps not yet consumed
    pub fn pending_steps(&self) -> usize {
        self.script.len()
    }

    /// Number of `read_batch` calls
    pub fn reads(&self) -> u32 {
        self.reads
    }

    /// Number of `force_read` calls
    pub fn forced_reads(&self) -> u32 {
        self.forced_reads
    }
}

impl SampleSource for MockSource {
    fn class(&self) -> SensorClass {
        self.class
    }

    fn mode(&self) -> BusMode {
        self.mode
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn temperature_model(&self) -> Option<TemperatureModel> {
        self.temperature_model
    }

    async fn read_batch(&mut self, out: &mut SampleBatch) -> Result<ReadOutcome, BusError> {
        self.reads += 1;

        match self.script.pop_front() {
            Some(Step::Samples {
                samples,
                more_pending,
            }) => {
                let room = out.capacity() - out.len();
                let take = samples.len().min(room);
                let _ = out.extend_from_slice(&samples[..take]);
                if take < samples.len() {
                    // Put the remainder back at the head of the queue
                    let mut rest = SampleBatch::new();
                    let _ = rest.extend_from_slice(&samples[take..]);
                    let _ = self.script.push_front(Step::Samples {
                        samples: rest,
                        more_pending,
                    });
                    return Ok(ReadOutcome::Samples { more_pending: true });
                }
                Ok(ReadOutcome::Samples { more_pending })
            }
            Some(Step::Error(error)) => Err(error),
            Some(Step::Empty) | None => Ok(ReadOutcome::Empty),
        }
    }

    async fn force_read(&mut self) -> Result<(), BusError> {
        self.forced_reads += 1;
        Ok(())
    }

    async fn self_test(&mut self) -> Result<(), BusError> {
        self.self_test_result
    }
}
