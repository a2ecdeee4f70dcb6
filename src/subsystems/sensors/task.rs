//! Sensor acquisition task
//!
//! One cycle per period: drain the gyro, then the accelerometer, then the
//! optional magnetometer, average what arrived, convert and publish. A FIFO
//! source that stays empty for the whole cycle budget abandons the cycle,
//! raises the sensors alarm and restarts the chip with a forced read.
//!
//! ```text
//!            ┌──────────── complete or partial reading ───────────┐
//!            ▼                                                    │
//!       ┌─────────┐  timeout / bus error   ┌────────────┐         │
//!  ───▶ │ Running │ ─────────────────────▶ │ Recovering │ ────────┘
//!       └─────────┘                        └────────────┘
//!                   (next cycle always starts as Running)
//! ```
//!
//! Wake-ups are anchored to the previous deadline, not to the end of the
//! cycle, so the rate does not drift with processing time.

use super::accumulator::SampleAccumulator;
use super::calibration::CalibrationSet;
use super::config::SensorsConfig;
use super::conversion::{
    convert_accel, convert_gyro, convert_mag, MagMeasurement, ScaledMeasurement,
    TemperatureTracker,
};
use super::error::{ReadFailure, SensorsError};
use super::io::{SensorInputs, SensorOutputs};
use crate::communication::telemetry::{self, AuxRecords, DebugLink};
use crate::core::traits::{AlarmSeverity, Clock, SystemAlarm};
use crate::devices::traits::{
    BusMode, ClassSet, ReadOutcome, SampleBatch, SampleSource, SensorClass,
};
use crate::{log_debug, log_error, log_info, log_warn};

/// Acquisition state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionState {
    Running,

    /// The previous cycle was abandoned
    Recovering,
}

/// Result of one acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Classes that produced a measurement (may be empty)
    Published { published: ClassSet },

    /// Classes that failed; nothing was published
    Abandoned { failed: ClassSet },
}

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorsStats {
    pub cycles: u32,
    pub abandoned: u32,
    pub timeouts: u32,
    pub bus_errors: u32,
    pub overruns: u32,
    pub frames_sent: u32,
    pub frames_dropped: u32,
}

/// Per-cycle timing limits handed to the drain helpers
struct CycleTiming {
    start_us: u64,
    budget_us: u64,
    poll_interval_us: u64,
}

/// Sensor acquisition task
///
/// `G`, `A` and `M` are the gyro, accelerometer and magnetometer sources.
/// Without a magnetometer pass `None` for `mag` (any `SampleSource` type
/// works as `M`).
pub struct SensorsTask<C, G, A, M> {
    config: SensorsConfig,
    clock: C,
    gyro: G,
    accel: A,
    mag: Option<M>,

    state: AcquisitionState,

    /// Set when a cycle is abandoned, cleared when the next one begins
    cycle_error: bool,

    /// Absolute deadline of the next wake-up, anchored on the first cycle
    next_wake_us: Option<u64>,

    batch: SampleBatch,
    gyro_temperature: TemperatureTracker,
    accel_temperature: TemperatureTracker,

    /// Last published records, repeated in debug frames when a class is idle
    last_accel: ScaledMeasurement,
    last_gyro: ScaledMeasurement,

    /// Calibration state last reported in the log
    calibrated: Option<bool>,

    stats: SensorsStats,
}

impl<C, G, A, M> SensorsTask<C, G, A, M>
where
    C: Clock,
    G: SampleSource,
    A: SampleSource,
    M: SampleSource,
{
    pub fn new(config: SensorsConfig, clock: C, gyro: G, accel: A, mag: Option<M>) -> Self {
        Self {
            config,
            clock,
            gyro,
            accel,
            mag,
            state: AcquisitionState::Running,
            cycle_error: false,
            next_wake_us: None,
            batch: SampleBatch::new(),
            gyro_temperature: TemperatureTracker::new(),
            accel_temperature: TemperatureTracker::new(),
            last_accel: ScaledMeasurement::default(),
            last_gyro: ScaledMeasurement::default(),
            calibrated: None,
            stats: SensorsStats::default(),
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// True while the last cycle is marked as failed
    pub fn cycle_error(&self) -> bool {
        self.cycle_error
    }

    pub fn stats(&self) -> SensorsStats {
        self.stats
    }

    pub fn config(&self) -> &SensorsConfig {
        &self.config
    }

    pub fn gyro_source_mut(&mut self) -> &mut G {
        &mut self.gyro
    }

    pub fn accel_source_mut(&mut self) -> &mut A {
        &mut self.accel
    }

    pub fn mag_source_mut(&mut self) -> Option<&mut M> {
        self.mag.as_mut()
    }

    /// Validate configuration and wiring, then self-test every source
    ///
    /// On a self-test failure the sensors alarm is set to critical.
    pub async fn start(
        &mut self,
        inputs: &SensorInputs,
        outputs: &mut SensorOutputs<'_>,
    ) -> Result<(), SensorsError> {
        self.config.validate()?;
        outputs.alarms.clear(SystemAlarm::Sensors);

        check_class(&self.gyro, SensorClass::Gyro)?;
        check_class(&self.accel, SensorClass::Accel)?;
        if let Some(mag) = self.mag.as_ref() {
            check_class(mag, SensorClass::Mag)?;
        }

        inputs.gyro_bias.set_enabled(self.config.bias_correct_gyro);
        self.note_calibration(&inputs.calibration.read());

        let mut result = self_test(&mut self.gyro).await;
        if result.is_ok() {
            result = self_test(&mut self.accel).await;
        }
        if result.is_ok() {
            if let Some(mag) = self.mag.as_mut() {
                result = self_test(mag).await;
            }
        }

        if let Err(e) = result {
            log_error!("{}", e);
            outputs
                .alarms
                .set(SystemAlarm::Sensors, AlarmSeverity::Critical);
            return Err(e);
        }

        log_info!(
            "Sensors started at {} Hz (mag: {})",
            self.config.rate_hz(),
            self.mag.is_some()
        );
        Ok(())
    }

    /// Run one acquisition cycle, including the wait for the next period
    pub async fn run_cycle(
        &mut self,
        inputs: &SensorInputs,
        outputs: &mut SensorOutputs<'_>,
    ) -> CycleOutcome {
        let start_us = self.clock.now_us();
        let period_us = u64::from(self.config.period_us);
        if self.next_wake_us.is_none() {
            self.next_wake_us = Some(start_us + period_us);
        }

        self.stats.cycles = self.stats.cycles.saturating_add(1);
        if self.state == AcquisitionState::Recovering {
            log_info!("Sensors resumed sampling");
        }
        self.state = AcquisitionState::Running;
        self.cycle_error = false;

        let timing = CycleTiming {
            start_us,
            budget_us: u64::from(self.config.cycle_budget_us),
            poll_interval_us: u64::from(self.config.poll_interval_us),
        };

        let mut gyro_acc = SampleAccumulator::new();
        let mut accel_acc = SampleAccumulator::new();
        let mut mag_acc = SampleAccumulator::new();
        let mut failed = ClassSet::empty();

        let result = drain(&self.clock, &mut self.gyro, &mut self.batch, &mut gyro_acc, &timing).await;
        if let Err(failure) = result {
            self.record_failure(SensorClass::Gyro, failure, &mut failed);
        }

        let result = drain(&self.clock, &mut self.accel, &mut self.batch, &mut accel_acc, &timing).await;
        if let Err(failure) = result {
            self.record_failure(SensorClass::Accel, failure, &mut failed);
        }

        if let Some(mag) = self.mag.as_mut() {
            let result = drain(&self.clock, mag, &mut self.batch, &mut mag_acc, &timing).await;
            if let Err(failure) = result {
                if self.config.mag_required {
                    self.record_failure(SensorClass::Mag, failure, &mut failed);
                } else {
                    mag_acc.reset();
                    log_debug!("Mag read skipped: {}", failure);
                }
            }
        }

        if !failed.is_empty() {
            self.recover(failed, outputs).await;
            return CycleOutcome::Abandoned { failed };
        }

        outputs.alarms.clear(SystemAlarm::Sensors);
        let published = self.publish(inputs, outputs, start_us, &gyro_acc, &accel_acc, &mag_acc);

        outputs.watchdog.kick();
        self.wait_next_period().await;

        CycleOutcome::Published { published }
    }

    /// Start the sources and run forever
    ///
    /// If startup fails the task halts: the alarm stays critical and the
    /// watchdog keeps being kicked so the failure stays visible instead of
    /// resetting the board.
    pub async fn run(mut self, inputs: &SensorInputs, mut outputs: SensorOutputs<'_>) -> ! {
        if let Err(e) = self.start(inputs, &mut outputs).await {
            log_error!("Sensors halted: {}", e);
            loop {
                self.halt_step(&mut outputs).await;
            }
        }

        loop {
            self.run_cycle(inputs, &mut outputs).await;
        }
    }

    /// One pass of the halted loop after a failed `start`
    ///
    /// Holds the alarm at critical and keeps the watchdog fed so the halt is
    /// reported instead of ending in a reset.
    pub async fn halt_step(&mut self, outputs: &mut SensorOutputs<'_>) {
        outputs
            .alarms
            .set(SystemAlarm::Sensors, AlarmSeverity::Critical);
        outputs.watchdog.kick();
        self.clock
            .delay_us(u64::from(self.config.halt_kick_interval_us))
            .await;
    }

    fn record_failure(&mut self, class: SensorClass, failure: ReadFailure, failed: &mut ClassSet) {
        match failure {
            ReadFailure::Timeout => self.stats.timeouts = self.stats.timeouts.saturating_add(1),
            ReadFailure::Bus(_) => {
                self.stats.bus_errors = self.stats.bus_errors.saturating_add(1)
            }
        }
        log_warn!("{} read failed: {}", class, failure);
        failed.insert(class);
    }

    /// Abandon the cycle: alarm, keep the watchdog alive, wait out the period,
    /// then restart FIFO sources that missed their read
    async fn recover(&mut self, failed: ClassSet, outputs: &mut SensorOutputs<'_>) {
        self.state = AcquisitionState::Recovering;
        self.cycle_error = true;
        self.stats.abandoned = self.stats.abandoned.saturating_add(1);

        outputs
            .alarms
            .set(SystemAlarm::Sensors, AlarmSeverity::Critical);
        outputs.watchdog.kick();
        self.wait_next_period().await;

        if failed.contains(SensorClass::Gyro) {
            restart(&mut self.gyro).await;
        }
        if failed.contains(SensorClass::Accel) {
            restart(&mut self.accel).await;
        }
        if failed.contains(SensorClass::Mag) {
            if let Some(mag) = self.mag.as_mut() {
                restart(mag).await;
            }
        }
    }

    fn publish(
        &mut self,
        inputs: &SensorInputs,
        outputs: &mut SensorOutputs<'_>,
        start_us: u64,
        gyro_acc: &SampleAccumulator,
        accel_acc: &SampleAccumulator,
        mag_acc: &SampleAccumulator,
    ) -> ClassSet {
        let calibration = inputs.calibration.read();
        self.note_calibration(&calibration);

        let mut published = ClassSet::empty();

        if let Some(accel) = convert_accel(accel_acc, self.accel.scale(), &calibration) {
            let temperature = self
                .accel_temperature
                .update(self.accel.temperature_model(), accel_acc);
            self.last_accel = ScaledMeasurement::new(accel, temperature);
            outputs.measurements.publish_accel(&self.last_accel);
            published.insert(SensorClass::Accel);
        }

        let correction = inputs.gyro_bias.correction();
        if let Some(rates) = convert_gyro(gyro_acc, self.gyro.scale(), correction) {
            let temperature = self
                .gyro_temperature
                .update(self.gyro.temperature_model(), gyro_acc);
            self.last_gyro = ScaledMeasurement::new(rates, temperature);
            outputs.measurements.publish_gyro(&self.last_gyro);
            published.insert(SensorClass::Gyro);
        }

        let mag = convert_mag(mag_acc, &calibration).map(MagMeasurement::new);
        if let Some(mag) = mag.as_ref() {
            outputs.measurements.publish_mag(mag);
            published.insert(SensorClass::Mag);
        }

        if self.config.telemetry_enabled {
            if let Some(link) = outputs.debug_link.as_deref_mut() {
                self.send_frame(link, start_us / 1000, mag.as_ref(), &inputs.aux);
            }
        }

        published
    }

    fn send_frame(
        &mut self,
        link: &mut dyn DebugLink,
        timestamp_ms: u64,
        mag: Option<&MagMeasurement>,
        aux: &AuxRecords,
    ) {
        let frame = telemetry::assemble(timestamp_ms, &self.last_accel, &self.last_gyro, mag, aux);
        match frame {
            Ok(frame) => match link.try_send(frame.as_bytes()) {
                Ok(()) => self.stats.frames_sent = self.stats.frames_sent.saturating_add(1),
                Err(_) => {
                    self.stats.frames_dropped = self.stats.frames_dropped.saturating_add(1);
                    log_debug!("Debug link busy, frame dropped");
                }
            },
            Err(e) => {
                self.stats.frames_dropped = self.stats.frames_dropped.saturating_add(1);
                log_warn!("{}", e);
            }
        }
    }

    /// Wait for the next fixed-period deadline
    ///
    /// When the loop has fallen more than a period behind it re-anchors on
    /// the current time instead of running back-to-back catch-up cycles.
    async fn wait_next_period(&mut self) {
        let period_us = u64::from(self.config.period_us);
        let now_us = self.clock.now_us();
        let deadline_us = self.next_wake_us.unwrap_or(now_us + period_us);

        if now_us > deadline_us + period_us {
            self.stats.overruns = self.stats.overruns.saturating_add(1);
            log_warn!(
                "Sensors cycle overran by {} us",
                now_us - deadline_us
            );
            // Sleep one full period so cycles never run back to back
            let wake_us = now_us + period_us;
            self.clock.wait_until(wake_us).await;
            self.next_wake_us = Some(wake_us + period_us);
            return;
        }

        self.clock.wait_until(deadline_us).await;
        self.next_wake_us = Some(deadline_us + period_us);
    }

    fn note_calibration(&mut self, calibration: &CalibrationSet) {
        let calibrated = calibration.is_calibrated();
        if self.calibrated == Some(calibrated) {
            return;
        }
        if calibrated {
            log_info!("Sensor calibration applied");
        } else {
            log_warn!("Sensor calibration has a zero scale; accel and mag read as -bias");
        }
        self.calibrated = Some(calibrated);
    }
}

fn check_class<S: SampleSource>(source: &S, expected: SensorClass) -> Result<(), SensorsError> {
    let actual = source.class();
    if actual != expected {
        return Err(SensorsError::ClassMismatch { expected, actual });
    }
    Ok(())
}

async fn self_test<S: SampleSource>(source: &mut S) -> Result<(), SensorsError> {
    source
        .self_test()
        .await
        .map_err(|cause| SensorsError::SelfTestFailed {
            class: source.class(),
            cause,
        })
}

/// Forced read for FIFO chips that stop raising data-ready after a miss
async fn restart<S: SampleSource>(source: &mut S) {
    if source.mode() != BusMode::Fifo {
        return;
    }
    if let Err(e) = source.force_read().await {
        log_warn!("{} restart failed: {}", source.class(), e);
    }
}

/// Collect this cycle's samples from one source into `acc`
///
/// FIFO sources are polled until the first sample shows up or the cycle
/// budget runs out, then drained until the chip reports nothing pending.
/// Single-sample sources are read exactly once; an empty read is not an
/// error and leaves `acc` empty.
async fn drain<C: Clock, S: SampleSource>(
    clock: &C,
    source: &mut S,
    batch: &mut SampleBatch,
    acc: &mut SampleAccumulator,
    timing: &CycleTiming,
) -> Result<(), ReadFailure> {
    if source.mode() == BusMode::SingleSample {
        batch.clear();
        let outcome = source.read_batch(batch).await.map_err(ReadFailure::Bus)?;
        if let ReadOutcome::Samples { .. } = outcome {
            acc.extend(batch);
        }
        return Ok(());
    }

    // Wait for the first sample
    loop {
        batch.clear();
        match source.read_batch(batch).await.map_err(ReadFailure::Bus)? {
            ReadOutcome::Samples { more_pending } => {
                acc.extend(batch);
                if !more_pending {
                    return Ok(());
                }
                break;
            }
            ReadOutcome::Empty => {
                if clock.elapsed_since(timing.start_us) > timing.budget_us {
                    return Err(ReadFailure::Timeout);
                }
                clock.delay_us(timing.poll_interval_us).await;
            }
        }
    }

    // Drain what is still queued; leftovers past the budget wait for next cycle
    while clock.elapsed_since(timing.start_us) <= timing.budget_us {
        batch.clear();
        match source.read_batch(batch).await.map_err(ReadFailure::Bus)? {
            ReadOutcome::Samples { more_pending } => {
                acc.extend(batch);
                if !more_pending {
                    break;
                }
            }
            ReadOutcome::Empty => break,
        }
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
