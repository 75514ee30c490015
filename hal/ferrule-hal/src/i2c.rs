//! I2C configuration
//!
//! I2C transfers are full blocking transactions addressed by a 7-bit
//! device address. A write issued without a stop condition leaves the bus
//! claimed so that the next read can follow with a repeated start.

use crate::gpio::LogicalPin;

/// Highest valid 7-bit device address
pub const MAX_7BIT_ADDRESS: u8 = 0x7F;

/// Bus clock, stretching policy and optional pin routing
///
/// `scl_pin` and `sda_pin`, when given, are switched to the I2C pin state
/// on setup if the board supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// SCL frequency in Hz
    pub frequency: u32,
    pub scl_pin: Option<LogicalPin>,
    pub sda_pin: Option<LogicalPin>,
    /// Wait for slaves holding SCL low
    pub clock_stretch: bool,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// 100 kHz
    pub const STANDARD: Self = Self::at(100_000);
    /// 400 kHz
    pub const FAST: Self = Self::at(400_000);
    /// 1 MHz
    pub const FAST_PLUS: Self = Self::at(1_000_000);

    const fn at(frequency: u32) -> Self {
        Self {
            frequency,
            scl_pin: None,
            sda_pin: None,
            clock_stretch: true,
        }
    }
}
