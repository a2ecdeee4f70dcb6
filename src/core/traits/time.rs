//! Clock abstraction for the fixed-period acquisition loop.
//!
//! The acquisition task needs three things from time: a monotonic timestamp to
//! measure the cycle budget, a short delay between FIFO polls, and an absolute
//! wake-up so the loop runs on a fixed period instead of a fixed delay.

use core::cell::Cell;

/// Platform-agnostic monotonic clock.
///
/// - `EmbassyClock` (behind the `embassy` feature) for embedded targets
/// - `MockClock` for host testing with controllable time
///
/// # Example
///
/// ```
/// use pico_sensors::core::traits::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// embassy_futures::block_on(clock.wait_until(2_000));
/// assert_eq!(clock.now_us(), 2_000);
/// ```
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Microseconds since system start.
    fn now_us(&self) -> u64;

    /// Milliseconds since system start.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }

    /// Elapsed microseconds since `reference_us`, saturating at zero.
    fn elapsed_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }

    /// Suspend for a short, bounded interval.
    async fn delay_us(&self, us: u64);

    /// Suspend until the absolute time `deadline_us`.
    ///
    /// Returns immediately if the deadline already passed.
    async fn wait_until(&self, deadline_us: u64);
}

impl<T: Clock> Clock for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    async fn delay_us(&self, us: u64) {
        (**self).delay_us(us).await
    }

    async fn wait_until(&self, deadline_us: u64) {
        (**self).wait_until(deadline_us).await
    }
}

// ============================================================================
// Embassy Implementation
// ============================================================================

/// Clock backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl Clock for EmbassyClock {
    fn now_us(&self) -> u64 {
        embassy_time::Instant::now().as_micros()
    }

    async fn delay_us(&self, us: u64) {
        embassy_time::Timer::after_micros(us).await
    }

    async fn wait_until(&self, deadline_us: u64) {
        embassy_time::Timer::at(embassy_time::Instant::from_micros(deadline_us)).await
    }
}

// ============================================================================
// Mock Implementation (always available for testing)
// ============================================================================

/// Mock clock whose time only moves when the code under test waits.
///
/// `delay_us` advances time by the requested amount and `wait_until` jumps
/// forward to the deadline, so a cycle that busy-polls an empty FIFO will
/// eventually exceed its time budget without any real sleeping.
#[derive(Debug, Default)]
pub struct MockClock {
    current_us: Cell<u64>,
    wakeups: Cell<u32>,
    last_deadline_us: Cell<Option<u64>>,
}

impl MockClock {
    /// Creates a new `MockClock` starting at time 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `MockClock` starting at the specified time.
    pub fn with_initial(us: u64) -> Self {
        let clock = Self::default();
        clock.current_us.set(us);
        clock
    }

    /// Advances the current time without counting as a wake-up.
    pub fn advance(&self, us: u64) {
        self.current_us.set(self.current_us.get() + us);
    }

    /// Number of `wait_until` calls so far.
    pub fn wakeups(&self) -> u32 {
        self.wakeups.get()
    }

    /// Deadline passed to the most recent `wait_until`.
    pub fn last_deadline_us(&self) -> Option<u64> {
        self.last_deadline_us.get()
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.current_us.get()
    }

    async fn delay_us(&self, us: u64) {
        self.advance(us);
    }

    async fn wait_until(&self, deadline_us: u64) {
        self.wakeups.set(self.wakeups.get() + 1);
        self.last_deadline_us.set(Some(deadline_us));
        if deadline_us > self.current_us.get() {
            self.current_us.set(deadline_us);
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn mock_clock_initial_value() {
        let clock = MockClock::new();
        assert_eq!(clock.now_us(), 0);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.wakeups(), 0);
        assert_eq!(clock.last_deadline_us(), None);
    }

    #[test]
    fn mock_clock_delay_advances_time() {
        let clock = MockClock::with_initial(1_000);
        block_on(clock.delay_us(250));
        assert_eq!(clock.now_us(), 1_250);
        assert_eq!(clock.wakeups(), 0);
    }

    #[test]
    fn mock_clock_wait_until_jumps_forward() {
        let clock = MockClock::new();
        block_on(clock.wait_until(2_000));
        assert_eq!(clock.now_us(), 2_000);
        assert_eq!(clock.wakeups(), 1);
        assert_eq!(clock.last_deadline_us(), Some(2_000));
    }

    #[test]
    fn mock_clock_wait_until_past_deadline_returns_immediately() {
        let clock = MockClock::with_initial(5_000);
        block_on(clock.wait_until(3_000));
        assert_eq!(clock.now_us(), 5_000);
        assert_eq!(clock.wakeups(), 1);
    }

    #[test]
    fn elapsed_since_saturates() {
        let clock = MockClock::with_initial(1_000);
        assert_eq!(clock.elapsed_since(400), 600);
        assert_eq!(clock.elapsed_since(5_000), 0);
    }

    #[test]
    fn clock_by_reference() {
        let clock = MockClock::new();
        let by_ref = &clock;
        block_on(by_ref.delay_us(10));
        assert_eq!(clock.now_us(), 10);
        assert_eq!(by_ref.now_ms(), 0);
    }
}
