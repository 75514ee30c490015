//! The single deferred-callback timer
//!
//! One slot, guarded by a critical section. Firing takes the schedule out
//! of the slot before running the callback, so a callback that
//! reschedules leaves exactly the new schedule armed.

use core::cell::Cell;

use critical_section::Mutex;

use ferrule_hal::SysTime;

/// One armed schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtilTimerSchedule {
    pub period_us: SysTime,
    pub deadline_us: SysTime,
    /// Bumped on every start, so a caller can tell schedules apart
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct TimerSlot {
    armed: Option<UtilTimerSchedule>,
    generation: u32,
}

pub struct UtilTimer {
    slot: Mutex<Cell<TimerSlot>>,
}

impl UtilTimer {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(TimerSlot {
                armed: None,
                generation: 0,
            })),
        }
    }

    /// Arm to fire `period_us` after `now`, replacing any armed schedule
    pub fn start(&self, now: SysTime, period_us: SysTime) -> UtilTimerSchedule {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut slot = cell.get();
            slot.generation = slot.generation.wrapping_add(1);
            let schedule = UtilTimerSchedule {
                period_us,
                deadline_us: now.saturating_add(period_us),
                generation: slot.generation,
            };
            slot.armed = Some(schedule);
            cell.set(slot);
            schedule
        })
    }

    pub fn disable(&self) {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut slot = cell.get();
            slot.armed = None;
            cell.set(slot);
        });
    }

    pub fn reschedule(&self, now: SysTime, period_us: SysTime) -> UtilTimerSchedule {
        self.disable();
        self.start(now, period_us)
    }

    pub fn schedule(&self) -> Option<UtilTimerSchedule> {
        critical_section::with(|cs| self.slot.borrow(cs).get().armed)
    }

    pub fn is_armed(&self) -> bool {
        self.schedule().is_some()
    }

    /// Take the armed schedule if its deadline has passed
    pub fn take_due(&self, now: SysTime) -> Option<UtilTimerSchedule> {
        critical_section::with(|cs| {
            let cell = self.slot.borrow(cs);
            let mut slot = cell.get();
            let due = slot.armed.filter(|s| now >= s.deadline_us)?;
            slot.armed = None;
            cell.set(slot);
            Some(due)
        })
    }

    /// Run `f` outside the critical section if the timer is due
    ///
    /// Returns whether it fired.
    pub fn fire_due<F: FnOnce(&UtilTimerSchedule)>(&self, now: SysTime, f: F) -> bool {
        match self.take_due(now) {
            Some(schedule) => {
                f(&schedule);
                true
            }
            None => false,
        }
    }
}

impl Default for UtilTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_at_deadline() {
        let timer = UtilTimer::new();
        timer.start(100, 50);
        assert!(!timer.fire_due(149, |_| panic!("fired early")));

        let mut seen = None;
        assert!(timer.fire_due(150, |s| seen = Some(s.period_us)));
        assert_eq!(seen, Some(50));
        assert!(!timer.is_armed());
        assert!(!timer.fire_due(1_000, |_| panic!("fired twice")));
    }

    #[test]
    fn test_start_replaces() {
        let timer = UtilTimer::new();
        let first = timer.start(0, 10);
        let second = timer.start(0, 500);
        assert_ne!(first.generation, second.generation);
        assert_eq!(timer.schedule(), Some(second));
        assert!(timer.take_due(10).is_none());
    }

    #[test]
    fn test_reschedule_from_callback() {
        let timer = UtilTimer::new();
        timer.start(0, 100);
        assert!(timer.fire_due(100, |s| {
            timer.reschedule(s.deadline_us, 40);
        }));

        let armed = timer.schedule().unwrap();
        assert_eq!(armed.period_us, 40);
        assert_eq!(armed.deadline_us, 140);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let timer = UtilTimer::new();
        timer.disable();
        timer.start(0, 1);
        timer.disable();
        timer.disable();
        assert!(!timer.is_armed());
    }
}
