//! Per-pin driving state
//!
//! One [`PinState`] is recorded per physical pin. A transition is checked
//! against both the board's supported states and the pin's capabilities
//! before the vendor driver is touched, so a rejected request leaves the
//! previous state in force.

use ferrule_hal::driver::{GpioDriver, PinMode};
use ferrule_hal::{HalError, HalResult, PhysicalPin, PinInfo, PinState};

use crate::pins::MAX_PINS;

/// Set of states a board can realize, one bit per [`PinState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSet(u16);

impl StateSet {
    pub fn from_states(states: &[PinState]) -> Self {
        let bits = states
            .iter()
            .fold(Self::bit(PinState::Undefined), |acc, s| acc | Self::bit(*s));
        Self(bits)
    }

    pub fn minimal() -> Self {
        Self::from_states(&PinState::MINIMAL)
    }

    pub fn contains(self, state: PinState) -> bool {
        self.0 & Self::bit(state) != 0
    }

    fn bit(state: PinState) -> u16 {
        1 << (state as u16)
    }
}

pub struct PinStateMachine {
    states: [PinState; MAX_PINS],
    supported: StateSet,
}

impl PinStateMachine {
    pub fn new(supported: StateSet) -> Self {
        Self {
            states: [PinState::Undefined; MAX_PINS],
            supported,
        }
    }

    pub fn supported(&self) -> StateSet {
        self.supported
    }

    /// Recorded state of a physical pin
    pub fn state(&self, pin: PhysicalPin) -> PinState {
        self.states
            .get(pin.index())
            .copied()
            .unwrap_or(PinState::Undefined)
    }

    /// Move a pin to `state`; on error nothing changes
    pub fn set_state<G: GpioDriver>(
        &mut self,
        gpio: &mut G,
        info: &PinInfo,
        state: PinState,
    ) -> HalResult<()> {
        let unsupported = HalError::UnsupportedState {
            pin: info.logical,
            state,
        };
        if !self.supported.contains(state) || !info.supports(state) {
            return Err(unsupported);
        }
        let slot = self
            .states
            .get_mut(info.physical.index())
            .ok_or(HalError::UnknownPin(info.logical))?;

        // Undefined parks the pin as a floating input
        let mode = PinMode::for_state(state).unwrap_or(PinMode::Input);
        gpio.set_mode(info.physical, mode).map_err(|_| {
            warn!("gpio {:?}: driver rejected {:?}", info.physical, mode);
            HalError::Gpio(info.logical)
        })?;

        *slot = state;
        Ok(())
    }

    /// Drive an output level
    ///
    /// A pin still in [`PinState::Undefined`] is first made a push-pull
    /// output.
    pub fn set_value<G: GpioDriver>(
        &mut self,
        gpio: &mut G,
        info: &PinInfo,
        value: bool,
    ) -> HalResult<()> {
        if self.state(info.physical) == PinState::Undefined {
            self.set_state(gpio, info, PinState::GpioOut)?;
        }
        gpio.set_level(info.physical, value);
        Ok(())
    }

    /// Forget every recorded state
    pub fn reset(&mut self) {
        self.states = [PinState::Undefined; MAX_PINS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal::PinCapabilities;
    use ferrule_hal_sim::SimGpio;

    fn machine() -> (PinStateMachine, SimGpio) {
        (PinStateMachine::new(StateSet::minimal()), SimGpio::new())
    }

    #[test]
    fn test_state_set() {
        let set = StateSet::minimal();
        assert!(set.contains(PinState::Undefined));
        assert!(set.contains(PinState::GpioOutOpenDrain));
        assert!(!set.contains(PinState::AdcIn));

        let wide = StateSet::from_states(&[PinState::GpioInPullUp, PinState::I2c]);
        assert!(wide.contains(PinState::I2c));
        assert!(!wide.contains(PinState::GpioOut));
    }

    #[test]
    fn test_set_state_programs_driver() {
        let (mut pins, mut gpio) = machine();
        let info = PinInfo::new(2, 2, PinCapabilities::GPIO);

        assert_eq!(pins.state(info.physical), PinState::Undefined);
        pins.set_state(&mut gpio, &info, PinState::GpioOutOpenDrain)
            .unwrap();
        assert_eq!(pins.state(info.physical), PinState::GpioOutOpenDrain);
        assert_eq!(gpio.mode(2), Some(PinMode::OutputOpenDrain));
    }

    #[test]
    fn test_rejected_state_keeps_previous() {
        let (mut pins, mut gpio) = machine();
        let info = PinInfo::new(4, 4, PinCapabilities::GPIO);
        pins.set_state(&mut gpio, &info, PinState::GpioIn).unwrap();

        // Board does not support pull-ups
        let err = pins
            .set_state(&mut gpio, &info, PinState::GpioInPullUp)
            .unwrap_err();
        assert_eq!(
            err,
            HalError::UnsupportedState {
                pin: info.logical,
                state: PinState::GpioInPullUp
            }
        );
        assert_eq!(pins.state(info.physical), PinState::GpioIn);
        assert_eq!(gpio.mode(4), Some(PinMode::Input));
    }

    #[test]
    fn test_capability_checked() {
        let (mut pins, mut gpio) = machine();
        let input_only = PinInfo::new(9, 9, PinCapabilities::DIGITAL_IN);
        assert!(pins
            .set_state(&mut gpio, &input_only, PinState::GpioOut)
            .is_err());
        assert_eq!(gpio.mode(9), None);
    }

    #[test]
    fn test_set_value_auto_output() {
        let (mut pins, mut gpio) = machine();
        let info = PinInfo::new(7, 7, PinCapabilities::GPIO);
        pins.set_value(&mut gpio, &info, true).unwrap();
        assert_eq!(pins.state(info.physical), PinState::GpioOut);
        assert!(gpio.level(7));

        pins.reset();
        assert_eq!(pins.state(info.physical), PinState::Undefined);
    }
}
