//! Board description
//!
//! A board is described by its pin table, the pin states it can realize,
//! the flash window reserved for interpreter storage and its console
//! settings. [`BoardConfig::reference`] is the built-in description; with
//! the `toml` feature a description can also be loaded from text:
//!
//! ```toml
//! name = "ferrule-ref"
//! serial_id = [0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01]
//! console_baud = 115200
//! supported_states = ["GpioOut", "GpioOutOpenDrain", "GpioIn"]
//!
//! [flash]
//! base = 0x100000
//! size = 0x40000
//!
//! [[pins]]
//! logical = 0
//! physical = "gpio0"
//! caps = "DIGITAL_OUT | DIGITAL_IN | OPEN_DRAIN | ALT_FUNCTION"
//! ```

use heapless::{String, Vec};

use ferrule_hal::uart::UartConfig;
use ferrule_hal::{HalError, HalResult, PinInfo, PinState};

use crate::gpio::StateSet;
use crate::pins::{PinMap, MAX_PINS, REFERENCE_PINS};

pub const MAX_NAME_LEN: usize = 24;
pub const MAX_SERIAL_ID_LEN: usize = 16;
pub const MAX_STATES: usize = PinState::ALL.len();

/// Byte range of the part reserved for interpreter storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "toml", derive(serde::Deserialize))]
pub struct FlashWindow {
    pub base: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub name: String<MAX_NAME_LEN>,
    /// Identity bytes reported as the board's serial number
    pub serial_id: Vec<u8, MAX_SERIAL_ID_LEN>,
    pub pins: Vec<PinInfo, MAX_PINS>,
    /// States beyond `Undefined` this board can put a pin in
    pub supported_states: Vec<PinState, MAX_STATES>,
    pub flash: FlashWindow,
    /// Settings applied to `SERIAL1` at init
    pub console: UartConfig,
}

impl BoardConfig {
    /// Built-in description of the reference board
    pub fn reference() -> Self {
        let mut config = Self {
            name: String::new(),
            serial_id: Vec::new(),
            pins: Vec::new(),
            supported_states: Vec::new(),
            flash: FlashWindow {
                base: 0x10_0000,
                size: 0x4_0000,
            },
            console: UartConfig::default(),
        };
        // All of these fit their capacities
        let _ = config.name.push_str("ferrule-ref");
        let _ = config
            .serial_id
            .extend_from_slice(&[0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01]);
        let _ = config.pins.extend_from_slice(&REFERENCE_PINS);
        let _ = config.supported_states.extend_from_slice(&PinState::MINIMAL);
        config
    }

    /// Validated pin table
    pub fn pin_map(&self) -> HalResult<PinMap> {
        PinMap::new(&self.pins)
    }

    pub fn state_set(&self) -> StateSet {
        StateSet::from_states(&self.supported_states)
    }

    /// Load a description from TOML text
    #[cfg(feature = "toml")]
    pub fn from_toml(text: &str) -> HalResult<Self> {
        let raw: text::BoardToml = toml::from_str(text).map_err(|_| {
            error!("board description is not valid TOML");
            HalError::Config
        })?;
        raw.into_config()
    }
}

#[cfg(feature = "toml")]
mod text {
    use alloc::string::String;
    use alloc::vec::Vec;

    use serde::Deserialize;

    use ferrule_hal::{HalError, HalResult, PinCapabilities, PinInfo, PinState};

    use super::{BoardConfig, FlashWindow};
    use crate::pins::parse_pin_string;

    fn default_baud() -> u32 {
        115_200
    }

    fn default_caps() -> PinCapabilities {
        PinCapabilities::GPIO
    }

    fn default_states() -> Vec<PinState> {
        PinState::MINIMAL.to_vec()
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    pub(super) struct BoardToml {
        name: String,
        #[serde(default)]
        serial_id: Vec<u8>,
        #[serde(default = "default_baud")]
        console_baud: u32,
        #[serde(default = "default_states")]
        supported_states: Vec<PinState>,
        flash: FlashWindow,
        pins: Vec<PinToml>,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct PinToml {
        logical: u8,
        physical: String,
        #[serde(default = "default_caps")]
        caps: PinCapabilities,
    }

    impl BoardToml {
        pub(super) fn into_config(self) -> HalResult<BoardConfig> {
            let mut config = BoardConfig::reference();
            config.flash = self.flash;
            config.console.baudrate = self.console_baud;

            config.name.clear();
            config
                .name
                .push_str(&self.name)
                .map_err(|_| too_long("name"))?;
            config.serial_id =
                heapless::Vec::from_slice(&self.serial_id).map_err(|_| too_long("serial_id"))?;
            config.supported_states = heapless::Vec::from_slice(&self.supported_states)
                .map_err(|_| too_long("supported_states"))?;

            config.pins.clear();
            for pin in self.pins {
                let physical = parse_pin_string(&pin.physical).ok_or_else(|| {
                    error!("pin {}: bad physical pin name", pin.logical);
                    HalError::Config
                })?;
                config
                    .pins
                    .push(PinInfo::new(pin.logical, physical.0, pin.caps))
                    .map_err(|_| HalError::PinTableFull)?;
            }

            // Catch duplicates now rather than at board construction
            config.pin_map()?;
            Ok(config)
        }
    }

    fn too_long(field: &str) -> HalError {
        error!("board description: {} too long", field);
        HalError::Config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal::{LogicalPin, PhysicalPin, PinCapabilities};

    #[test]
    fn test_reference_description() {
        let config = BoardConfig::reference();
        assert_eq!(config.name.as_str(), "ferrule-ref");
        assert_eq!(config.pins.len(), 16);
        assert!(config.state_set().contains(PinState::GpioOutOpenDrain));
        assert!(!config.state_set().contains(PinState::AdcIn));
        assert_eq!(config.flash.size % 4096, 0);
        assert!(config.pin_map().is_ok());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_bundled_description_matches_builtin() {
        let text = include_str!("../boards/reference.toml");
        assert_eq!(BoardConfig::from_toml(text).unwrap(), BoardConfig::reference());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_overrides() {
        let text = r#"
            name = "tiny"
            supported_states = ["GpioOut", "GpioIn", "GpioInPullUp"]

            [flash]
            base = 0x0
            size = 0x2000

            [[pins]]
            logical = 1
            physical = "GPIO21"

            [[pins]]
            logical = 2
            physical = "34"
            caps = "DIGITAL_IN"
        "#;
        let config = BoardConfig::from_toml(text).unwrap();
        assert_eq!(config.name.as_str(), "tiny");
        assert!(config.serial_id.is_empty());
        assert_eq!(config.console.baudrate, 115_200);
        assert!(config.state_set().contains(PinState::GpioInPullUp));

        let map = config.pin_map().unwrap();
        assert_eq!(map.physical(LogicalPin(1)).unwrap(), PhysicalPin(21));
        let input = map.resolve(LogicalPin(2)).unwrap();
        assert_eq!(input.caps, PinCapabilities::DIGITAL_IN);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_toml_rejections() {
        let duplicate = r#"
            name = "dup"
            flash = { base = 0, size = 4096 }
            pins = [
                { logical = 1, physical = "gpio1" },
                { logical = 1, physical = "gpio2" },
            ]
        "#;
        assert_eq!(
            BoardConfig::from_toml(duplicate),
            Err(HalError::DuplicatePin(LogicalPin(1)))
        );

        let bad_pin = r#"
            name = "bad"
            flash = { base = 0, size = 4096 }
            pins = [{ logical = 1, physical = "PA5" }]
        "#;
        assert_eq!(BoardConfig::from_toml(bad_pin), Err(HalError::Config));

        assert_eq!(BoardConfig::from_toml("name = 3"), Err(HalError::Config));
    }
}
