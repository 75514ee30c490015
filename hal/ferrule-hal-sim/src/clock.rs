//! Simulated microsecond counter, low-power clock and sleep controller

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use ferrule_hal::driver::{CounterSource, RtcSource, SleepControl};

struct CounterInner {
    value: AtomicU32,
    step: AtomicU32,
}

/// Free-running 32-bit counter
///
/// Every read advances the counter by `step` so that busy-waits in the
/// code under test make progress. Tests that need exact times set the
/// step to zero and advance by hand.
#[derive(Clone)]
pub struct SimCounter {
    inner: Arc<CounterInner>,
}

impl SimCounter {
    pub fn new(start: u32) -> Self {
        Self {
            inner: Arc::new(CounterInner {
                value: AtomicU32::new(start),
                step: AtomicU32::new(1),
            }),
        }
    }

    pub fn set(&self, value: u32) {
        self.inner.value.store(value, Ordering::SeqCst);
    }

    /// Advance, wrapping at 2^32
    pub fn advance(&self, us: u32) {
        self.inner.value.fetch_add(us, Ordering::SeqCst);
    }

    pub fn set_step(&self, step: u32) {
        self.inner.step.store(step, Ordering::SeqCst);
    }

    /// Current value without advancing
    pub fn value(&self) -> u32 {
        self.inner.value.load(Ordering::SeqCst)
    }
}

impl CounterSource for SimCounter {
    fn raw(&self) -> u32 {
        let step = self.inner.step.load(Ordering::SeqCst);
        self.inner.value.fetch_add(step, Ordering::SeqCst)
    }
}

struct RtcInner {
    ticks: AtomicU32,
    calibration_q12: AtomicU32,
}

/// Low-power tick counter with a settable calibration
#[derive(Clone)]
pub struct SimRtc {
    inner: Arc<RtcInner>,
}

impl SimRtc {
    /// 32.768 kHz crystal: 30.517578125 us per tick
    pub const DEFAULT_CALIBRATION_Q12: u32 = 125_000;

    pub fn new(calibration_q12: u32) -> Self {
        Self {
            inner: Arc::new(RtcInner {
                ticks: AtomicU32::new(0),
                calibration_q12: AtomicU32::new(calibration_q12),
            }),
        }
    }

    pub fn advance_ticks(&self, ticks: u32) {
        self.inner.ticks.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn set_calibration(&self, calibration_q12: u32) {
        self.inner
            .calibration_q12
            .store(calibration_q12, Ordering::SeqCst);
    }
}

impl RtcSource for SimRtc {
    fn ticks(&self) -> u32 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    fn calibration_q12(&self) -> u32 {
        self.inner.calibration_q12.load(Ordering::SeqCst)
    }
}

/// Light sleep that runs the RTC and leaves the main counter stopped
#[derive(Clone)]
pub struct SimSleep {
    rtc: SimRtc,
    sleeps: Arc<AtomicUsize>,
}

impl SimSleep {
    pub fn new(rtc: SimRtc) -> Self {
        Self {
            rtc,
            sleeps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of completed light sleeps
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl SleepControl for SimSleep {
    fn light_sleep(&mut self, duration_us: u64) -> bool {
        let cal = u64::from(self.rtc.calibration_q12());
        if cal == 0 {
            return false;
        }
        let ticks = (duration_us << 12) / cal;
        self.rtc.advance_ticks(ticks.min(u64::from(u32::MAX)) as u32);
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_steps_per_read() {
        let counter = SimCounter::new(10);
        assert_eq!(counter.raw(), 10);
        assert_eq!(counter.raw(), 11);

        counter.set_step(0);
        counter.set(u32::MAX);
        counter.advance(2);
        assert_eq!(counter.raw(), 1);
    }

    #[test]
    fn test_sleep_runs_rtc_only() {
        let counter = SimCounter::new(0);
        counter.set_step(0);
        let rtc = SimRtc::new(SimRtc::DEFAULT_CALIBRATION_Q12);
        let mut sleep = SimSleep::new(rtc.clone());

        assert!(sleep.light_sleep(1_000_000));
        assert_eq!(rtc.ticks(), 32_768);
        assert_eq!(counter.value(), 0);
        assert_eq!(sleep.sleeps(), 1);
    }
}
