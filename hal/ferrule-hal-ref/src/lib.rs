//! Reference Ferrule board
//!
//! Implements the full [`ferrule_hal`] contract using nothing but
//! vendor-driver capabilities: the GPIO seams from [`ferrule_hal::driver`],
//! embedded-io serial ports, embedded-hal SPI and I2C buses, and an
//! embedded-storage NOR flash. Any part whose drivers provide those can be
//! brought up by naming them in a [`BoardDrivers`] impl.
//!
//! The board is a pair: [`BoardShared`] is the interrupt-safe half and
//! [`Board`] the normal-context half that the interpreter owns.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[cfg(feature = "toml")]
extern crate alloc;

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod board;
pub mod clock;
pub mod config;
pub mod events;
pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod pins;
pub mod spi;
pub mod timer;
pub mod uart;
pub mod watchdog;

pub use board::{Board, BoardDrivers, BoardPeripherals, BoardShared};
pub use config::{BoardConfig, FlashWindow};
pub use events::EventFlagRegistry;
pub use pins::{parse_pin_string, PinMap, REFERENCE_PINS};
