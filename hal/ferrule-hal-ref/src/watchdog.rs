//! Software watchdog
//!
//! The reference board has no watchdog peripheral of its own. Expiry is
//! checked from the idle loop against system time, which catches a stuck
//! interpreter but not a stuck idle loop.

use ferrule_hal::SysTime;

#[derive(Debug, Default)]
pub struct SoftWatchdog {
    timeout_us: Option<SysTime>,
    last_kick: SysTime,
}

impl SoftWatchdog {
    pub fn enable(&mut self, now: SysTime, timeout_us: SysTime) {
        self.timeout_us = Some(timeout_us);
        self.last_kick = now;
    }

    pub fn disable(&mut self) {
        self.timeout_us = None;
    }

    pub fn kick(&mut self, now: SysTime) {
        self.last_kick = now;
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout_us.is_some()
    }

    pub fn expired(&self, now: SysTime) -> bool {
        self.timeout_us
            .is_some_and(|timeout| now.saturating_sub(self.last_kick) > timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_defers_expiry() {
        let mut wdt = SoftWatchdog::default();
        assert!(!wdt.expired(u64::MAX));

        wdt.enable(1_000, 500);
        assert!(!wdt.expired(1_500));
        assert!(wdt.expired(1_501));

        wdt.kick(1_400);
        assert!(!wdt.expired(1_900));

        wdt.disable();
        assert!(!wdt.expired(10_000));
    }
}
