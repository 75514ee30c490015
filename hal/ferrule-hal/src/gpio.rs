//! Pin identifiers, capabilities and states
//!
//! The interpreter names pins by [`LogicalPin`], a small integer that is
//! stable across boards. Each board translates it to exactly one
//! [`PhysicalPin`] through its pin table, or fails with
//! [`HalError::UnknownPin`](crate::HalError::UnknownPin).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Portable pin identifier used by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogicalPin(pub u8);

/// Board-native pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicalPin(pub u8);

impl PhysicalPin {
    /// Index into per-pin arenas
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// What a pin can be used for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct PinCapabilities: u16 {
        const DIGITAL_OUT = 1 << 0;
        const DIGITAL_IN = 1 << 1;
        const OPEN_DRAIN = 1 << 2;
        const ANALOG_IN = 1 << 3;
        const ANALOG_OUT = 1 << 4;
        const ALT_FUNCTION = 1 << 5;
        const USART = 1 << 6;
        const I2C = 1 << 7;

        /// Plain bidirectional GPIO
        const GPIO = Self::DIGITAL_OUT.bits() | Self::DIGITAL_IN.bits() | Self::OPEN_DRAIN.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PinCapabilities {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PinCapabilities({=u16:#x})", self.bits())
    }
}

/// Driving mode of a pin
///
/// Exactly one state is active per physical pin. A board that has never
/// been asked to configure a pin reports [`PinState::Undefined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PinState {
    #[default]
    Undefined,
    GpioOut,
    GpioOutOpenDrain,
    GpioIn,
    GpioInPullUp,
    GpioInPullDown,
    AdcIn,
    AfOut,
    AfOutOpenDrain,
    UsartIn,
    UsartOut,
    DacOut,
    I2c,
}

impl PinState {
    /// Every state, in declaration order
    pub const ALL: [PinState; 13] = [
        PinState::Undefined,
        PinState::GpioOut,
        PinState::GpioOutOpenDrain,
        PinState::GpioIn,
        PinState::GpioInPullUp,
        PinState::GpioInPullDown,
        PinState::AdcIn,
        PinState::AfOut,
        PinState::AfOutOpenDrain,
        PinState::UsartIn,
        PinState::UsartOut,
        PinState::DacOut,
        PinState::I2c,
    ];

    /// States every board must honour
    pub const MINIMAL: [PinState; 3] = [
        PinState::GpioOut,
        PinState::GpioOutOpenDrain,
        PinState::GpioIn,
    ];

    /// Capabilities a pin needs before it can enter this state
    pub fn required_capabilities(self) -> PinCapabilities {
        use PinState::*;
        match self {
            Undefined => PinCapabilities::empty(),
            GpioOut => PinCapabilities::DIGITAL_OUT,
            GpioOutOpenDrain => PinCapabilities::DIGITAL_OUT | PinCapabilities::OPEN_DRAIN,
            GpioIn | GpioInPullUp | GpioInPullDown => PinCapabilities::DIGITAL_IN,
            AdcIn => PinCapabilities::ANALOG_IN,
            AfOut => PinCapabilities::ALT_FUNCTION,
            AfOutOpenDrain => PinCapabilities::ALT_FUNCTION | PinCapabilities::OPEN_DRAIN,
            UsartIn | UsartOut => PinCapabilities::USART,
            DacOut => PinCapabilities::ANALOG_OUT,
            I2c => PinCapabilities::I2C,
        }
    }

    /// State drives the pin
    pub fn is_output(self) -> bool {
        matches!(
            self,
            PinState::GpioOut
                | PinState::GpioOutOpenDrain
                | PinState::AfOut
                | PinState::AfOutOpenDrain
                | PinState::UsartOut
                | PinState::DacOut
        )
    }

    /// State samples the pin as a digital input
    pub fn is_digital_input(self) -> bool {
        matches!(
            self,
            PinState::GpioIn | PinState::GpioInPullUp | PinState::GpioInPullDown
        )
    }
}

/// One resolved entry of a board's pin table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinInfo {
    pub logical: LogicalPin,
    pub physical: PhysicalPin,
    pub caps: PinCapabilities,
}

impl PinInfo {
    pub const fn new(logical: u8, physical: u8, caps: PinCapabilities) -> Self {
        Self {
            logical: LogicalPin(logical),
            physical: PhysicalPin(physical),
            caps,
        }
    }

    /// Pin has every capability the state needs
    pub fn supports(&self, state: PinState) -> bool {
        self.caps.contains(state.required_capabilities())
    }
}

/// Peripheral function currently routed to a pin (timer channel, PWM, ...)
///
/// Opaque to the interpreter; boards encode their own numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinFunction(pub u16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_capabilities() {
        assert_eq!(
            PinState::GpioOut.required_capabilities(),
            PinCapabilities::DIGITAL_OUT
        );
        assert!(PinState::Undefined.required_capabilities().is_empty());
        assert!(PinState::GpioOutOpenDrain
            .required_capabilities()
            .contains(PinCapabilities::OPEN_DRAIN));
    }

    #[test]
    fn test_pin_info_supports() {
        let gpio = PinInfo::new(5, 5, PinCapabilities::GPIO);
        for state in PinState::MINIMAL {
            assert!(gpio.supports(state));
        }
        assert!(!gpio.supports(PinState::AdcIn));
        assert!(!gpio.supports(PinState::I2c));

        let input_only = PinInfo::new(6, 34, PinCapabilities::DIGITAL_IN);
        assert!(input_only.supports(PinState::GpioIn));
        assert!(!input_only.supports(PinState::GpioOut));
    }

    #[test]
    fn test_state_direction() {
        assert!(PinState::GpioOut.is_output());
        assert!(!PinState::GpioIn.is_output());
        assert!(PinState::GpioInPullUp.is_digital_input());
        assert!(!PinState::AdcIn.is_digital_input());
    }
}
