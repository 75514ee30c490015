//! System time representation
//!
//! System time is a 64-bit microsecond count. It is monotonic during
//! normal operation except across an explicit `set_system_time` and across
//! deep sleep, where boards are allowed to restart it at zero.

/// Microseconds since the board's time base
pub type SysTime = u64;

/// Longest a normal-context call may busy-wait before it starves
/// interrupt-driven work (radio stacks, serial FIFOs)
pub const MAX_BLOCKING_US: u64 = 10_000;

pub const MICROS_PER_MILLI: u64 = 1_000;

/// Convert fractional milliseconds to system time
///
/// Negative and NaN inputs clamp to zero; values beyond the range of
/// `SysTime` saturate.
pub fn time_from_millis(ms: f64) -> SysTime {
    let us = ms * MICROS_PER_MILLI as f64;
    if us.is_nan() || us <= 0.0 {
        0
    } else if us >= SysTime::MAX as f64 {
        SysTime::MAX
    } else {
        us as SysTime
    }
}

/// Convert system time to fractional milliseconds
pub fn millis_from_time(time: SysTime) -> f64 {
    time as f64 / MICROS_PER_MILLI as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion() {
        assert_eq!(time_from_millis(1.5), 1_500);
        assert_eq!(time_from_millis(0.0), 0);
        assert_eq!(time_from_millis(-3.0), 0);
        assert_eq!(time_from_millis(f64::NAN), 0);
        assert_eq!(time_from_millis(f64::INFINITY), SysTime::MAX);
        assert_eq!(millis_from_time(2_500), 2.5);
    }
}
