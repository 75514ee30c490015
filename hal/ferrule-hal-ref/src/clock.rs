//! 64-bit system time over a 32-bit hardware counter
//!
//! The counter wraps every ~71.6 minutes. Each read compares the raw
//! value with the previous one and counts a wrap when it went backwards,
//! so time stays monotonic as long as the clock is read at least once per
//! wrap period; the idle loop reads it far more often than that.
//!
//! Light sleep stops the counter on most parts. Entering sleep snapshots
//! the low-power RTC; leaving it converts the elapsed RTC ticks through the
//! current calibration and rebases the counter so time carries on from
//! where it should be. Deep sleep loses the counter entirely and time
//! restarts at zero.

use core::cell::Cell;

use critical_section::Mutex;

use ferrule_hal::driver::{CounterSource, RtcSource};
use ferrule_hal::time::MAX_BLOCKING_US;
use ferrule_hal::{HalError, HalResult, SysTime};

#[derive(Debug, Clone, Copy)]
struct SleepMark {
    rtc_ticks: u32,
    time: SysTime,
}

#[derive(Debug, Clone, Copy)]
struct ClockState {
    last_raw: u32,
    wraps: u32,
    /// Added to the extended counter value to give system time; wide
    /// enough for any `SysTime` minus any extended reading
    offset: i128,
    sleep: Option<SleepMark>,
}

impl ClockState {
    fn extended(&self, raw: u32) -> u64 {
        (u64::from(self.wraps) << 32) | u64::from(raw)
    }

    /// Saturates at both ends of the `SysTime` range
    fn time_at(&self, raw: u32) -> SysTime {
        let t = i128::from(self.extended(raw)) + self.offset;
        t.clamp(0, i128::from(SysTime::MAX)) as SysTime
    }

    /// Fold a fresh raw reading in, counting a wrap if it went backwards
    fn observe(&mut self, raw: u32) {
        if raw < self.last_raw {
            self.wraps = self.wraps.wrapping_add(1);
        }
        self.last_raw = raw;
    }

    /// Make `raw` read as `time`
    fn rebase(&mut self, raw: u32, time: SysTime) {
        self.last_raw = raw;
        self.offset = i128::from(time) - i128::from(self.extended(raw));
    }
}

pub struct SystemClock<C, R> {
    counter: C,
    rtc: R,
    state: Mutex<Cell<ClockState>>,
}

impl<C: CounterSource, R: RtcSource> SystemClock<C, R> {
    pub fn new(counter: C, rtc: R) -> Self {
        let raw = counter.raw();
        Self {
            counter,
            rtc,
            state: Mutex::new(Cell::new(ClockState {
                last_raw: raw,
                wraps: 0,
                offset: 0,
                sleep: None,
            })),
        }
    }

    /// Current system time; safe from interrupt context
    pub fn now(&self) -> SysTime {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let raw = self.counter.raw();
            state.observe(raw);
            cell.set(state);
            state.time_at(raw)
        })
    }

    /// Splice in an externally supplied time
    pub fn set(&self, time: SysTime) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let raw = self.counter.raw();
            state.observe(raw);
            state.rebase(raw, time);
            cell.set(state);
        });
        debug!("system time set to {}", time);
    }

    /// Busy-wait for `us` microseconds
    pub fn delay_us(&self, us: u64) -> HalResult<()> {
        if us > MAX_BLOCKING_US {
            return Err(HalError::TooLong {
                requested_us: us,
                limit_us: MAX_BLOCKING_US,
            });
        }
        let start = self.now();
        while self.now().saturating_sub(start) < us {
            core::hint::spin_loop();
        }
        Ok(())
    }

    pub fn has_rtc(&self) -> bool {
        self.rtc.present()
    }

    /// Snapshot the RTC before the counter stops
    pub fn enter_light_sleep(&self) {
        let time = self.now();
        let rtc_ticks = self.rtc.ticks();
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.sleep = Some(SleepMark { rtc_ticks, time });
            cell.set(state);
        });
    }

    /// Carry time across the sleep just finished; returns the
    /// microseconds spent asleep
    pub fn exit_light_sleep(&self) -> SysTime {
        let rtc_now = self.rtc.ticks();
        let calibration = u64::from(self.rtc.calibration_q12());
        let slept = critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let Some(mark) = state.sleep.take() else {
                return 0;
            };
            let ticks = u64::from(rtc_now.wrapping_sub(mark.rtc_ticks));
            let slept = (ticks * calibration) >> 12;

            let raw = self.counter.raw();
            state.observe(raw);
            // Never step backwards if the counter kept running
            let target = mark.time.saturating_add(slept).max(state.time_at(raw));
            state.rebase(raw, target);
            cell.set(state);
            slept
        });
        trace!("slept {} us", slept);
        slept
    }

    /// Restart time at zero after a deep-sleep wake
    pub fn wake_from_deep_sleep(&self) {
        critical_section::with(|cs| {
            let raw = self.counter.raw();
            let mut state = ClockState {
                last_raw: raw,
                wraps: 0,
                offset: 0,
                sleep: None,
            };
            state.rebase(raw, 0);
            self.state.borrow(cs).set(state);
        });
        info!("deep sleep wake, system time restarted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal::driver::NoRtc;
    use ferrule_hal_sim::{SimCounter, SimRtc};

    fn exact_counter(start: u32) -> SimCounter {
        let counter = SimCounter::new(start);
        counter.set_step(0);
        counter
    }

    #[test]
    fn test_wrap_is_absorbed() {
        let counter = exact_counter(u32::MAX - 10);
        let clock = SystemClock::new(counter.clone(), NoRtc);
        let before = clock.now();

        counter.advance(20);
        let after = clock.now();
        assert_eq!(after - before, 20);
        assert_eq!(after, (1u64 << 32) + 9);
    }

    #[test]
    fn test_set_time_then_continue() {
        let counter = exact_counter(500);
        let clock = SystemClock::new(counter.clone(), NoRtc);
        clock.set(1_000_000);
        assert_eq!(clock.now(), 1_000_000);

        counter.advance(250);
        assert_eq!(clock.now(), 1_000_250);

        // Time may be set backwards, once
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_set_beyond_signed_range() {
        let counter = exact_counter(u32::MAX - 4);
        let clock = SystemClock::new(counter.clone(), NoRtc);

        let late = i64::MAX as SysTime + 1_000;
        clock.set(late);
        assert_eq!(clock.now(), late);
        counter.advance(10);
        assert_eq!(clock.now(), late + 10);

        clock.set(SysTime::MAX - 5);
        counter.advance(100);
        assert_eq!(clock.now(), SysTime::MAX);
    }

    #[test]
    fn test_delay_limits() {
        let counter = SimCounter::new(0);
        counter.set_step(7);
        let clock = SystemClock::new(counter, NoRtc);

        let start = clock.now();
        clock.delay_us(100).unwrap();
        assert!(clock.now() - start >= 100);

        assert_eq!(
            clock.delay_us(MAX_BLOCKING_US + 1),
            Err(HalError::TooLong {
                requested_us: MAX_BLOCKING_US + 1,
                limit_us: MAX_BLOCKING_US
            })
        );
    }

    #[test]
    fn test_light_sleep_carries_time() {
        let counter = exact_counter(1_000);
        let rtc = SimRtc::new(SimRtc::DEFAULT_CALIBRATION_Q12);
        let clock = SystemClock::new(counter.clone(), rtc.clone());
        let before = clock.now();

        clock.enter_light_sleep();
        // One second of 32.768 kHz ticks while the counter is stopped
        rtc.advance_ticks(32_768);
        assert_eq!(clock.exit_light_sleep(), 1_000_000);
        assert_eq!(clock.now(), before + 1_000_000);

        counter.advance(5);
        assert_eq!(clock.now(), before + 1_000_005);
    }

    #[test]
    fn test_exit_without_enter() {
        let clock = SystemClock::new(exact_counter(0), SimRtc::new(0));
        assert_eq!(clock.exit_light_sleep(), 0);
    }

    #[test]
    fn test_deep_sleep_restarts_at_zero() {
        let counter = exact_counter(0);
        let clock = SystemClock::new(counter.clone(), NoRtc);
        counter.advance(123_456);
        assert_eq!(clock.now(), 123_456);

        counter.set(77);
        clock.wake_from_deep_sleep();
        assert_eq!(clock.now(), 0);
        counter.advance(3);
        assert_eq!(clock.now(), 3);
    }
}
