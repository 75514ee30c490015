//! Vendor driver seams
//!
//! Board ports consume vendor SDK drivers as opaque capabilities. Buses and
//! flash use the embedded-hal, embedded-io and embedded-storage traits
//! directly; the traits here cover what those crates do not model: pin
//! mode switching by number, interrupt-safe level reads, raw hardware
//! counters and runtime bus reconfiguration.

use crate::gpio::{PhysicalPin, PinState};

/// Electrical mode a vendor GPIO driver can program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    Output,
    OutputOpenDrain,
    Input,
    InputPullUp,
    InputPullDown,
    Analog,
    AltFunction,
    AltFunctionOpenDrain,
}

impl PinMode {
    /// Mode that realizes a pin state, if the state maps to a plain mode
    pub fn for_state(state: PinState) -> Option<Self> {
        use PinState::*;
        match state {
            Undefined => None,
            GpioOut => Some(PinMode::Output),
            GpioOutOpenDrain => Some(PinMode::OutputOpenDrain),
            GpioIn | UsartIn => Some(PinMode::Input),
            GpioInPullUp => Some(PinMode::InputPullUp),
            GpioInPullDown => Some(PinMode::InputPullDown),
            AdcIn | DacOut => Some(PinMode::Analog),
            AfOut | UsartOut => Some(PinMode::AltFunction),
            AfOutOpenDrain | I2c => Some(PinMode::AltFunctionOpenDrain),
        }
    }
}

/// Normal-context GPIO control
pub trait GpioDriver {
    type Error: core::fmt::Debug;

    /// Program the pin's direction and pull
    fn set_mode(&mut self, pin: PhysicalPin, mode: PinMode) -> Result<(), Self::Error>;

    /// Drive the output level
    fn set_level(&mut self, pin: PhysicalPin, high: bool);

    /// Enable or disable the edge interrupt for a pin
    fn set_edge_interrupt(&mut self, pin: PhysicalPin, enabled: bool) -> Result<(), Self::Error>;
}

/// Interrupt-safe GPIO input register
///
/// Reading must not block, allocate or take any lock an interrupt handler
/// could hold.
pub trait GpioInput: Sync {
    fn level(&self, pin: PhysicalPin) -> bool;
}

/// Free-running 32-bit microsecond counter
///
/// Wraps roughly every 71.6 minutes. Stops (and on most parts resets)
/// across deep sleep.
pub trait CounterSource: Sync {
    fn raw(&self) -> u32;
}

/// Low-power clock that keeps running through light sleep
///
/// Its tick period drifts with temperature and supply, so it is only used
/// to measure sleep intervals, converted through the latest calibration.
pub trait RtcSource: Sync {
    /// Raw 32-bit tick count
    fn ticks(&self) -> u32;

    /// Tick period in microseconds, Q12 fixed point
    fn calibration_q12(&self) -> u32;

    /// Board actually has this clock
    fn present(&self) -> bool {
        true
    }
}

/// Light-sleep entry provided by the vendor power driver
pub trait SleepControl {
    /// Sleep for up to `duration_us`, waking early on any interrupt;
    /// returns whether the part actually slept
    fn light_sleep(&mut self, duration_us: u64) -> bool;
}

/// Bus driver that can be reprogrammed after construction
///
/// `C` is one of [`crate::uart::UartConfig`], [`crate::spi::SpiConfig`] or
/// [`crate::i2c::I2cConfig`]. A driver that cannot realize a setting must
/// return an error and keep its previous configuration.
pub trait SetConfig<C> {
    type ConfigError: core::fmt::Debug;

    fn set_config(&mut self, config: &C) -> Result<(), Self::ConfigError>;
}

/// Placeholder for boards that cannot sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSleep;

impl SleepControl for NoSleep {
    fn light_sleep(&mut self, _duration_us: u64) -> bool {
        false
    }
}

/// Placeholder for boards without a low-power clock
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRtc;

impl RtcSource for NoRtc {
    fn ticks(&self) -> u32 {
        0
    }

    fn calibration_q12(&self) -> u32 {
        0
    }

    fn present(&self) -> bool {
        false
    }
}
