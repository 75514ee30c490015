//! Ferrule board-support contract
//!
//! This crate defines the operations an interpreter runtime requires from
//! any microcontroller board so that the same interpreter behaves the same
//! way on every hardware family. A board port implements
//! [`PeripheralCapability`] once; the interpreter holds that one instance.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Interpreter runtime (idle loop, ...)   │
//! └─────────────────────────────────────────┘
//!          │ normal context     │ interrupt context
//!          ▼                    ▼
//! ┌──────────────────┐  ┌──────────────────┐
//! │ PeripheralCap.   │──│ IrqCapability    │   (this crate - contract)
//! └──────────────────┘  └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────┐
//! │ board port (ferrule-hal-ref, ...)       │
//! └─────────────────────────────────────────┘
//!          │
//!          ▼
//!   vendor drivers ([`driver`] traits, embedded-hal, embedded-io,
//!   embedded-storage)
//! ```
//!
//! # Execution contexts
//!
//! [`IrqCapability`] holds everything an interrupt handler may call, all
//! through `&self`:
//!
//! - reading a pin level or a watched pin's latched level
//! - reading system time
//! - pushing an event
//! - starting, rescheduling or disabling the util timer, via its
//!   [`UtilTimerControl`] supertrait, so a timer callback can arm the next
//!   deadline
//!
//! Everything else is on [`PeripheralCapability`] and is normal-context only.

#![no_std]
#![deny(unsafe_code)]

pub mod capability;
pub mod driver;
pub mod error;
pub mod event;
pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod spi;
pub mod time;
pub mod uart;

pub use capability::{IrqCapability, PeripheralCapability, UtilTimerControl};
pub use error::{ErrorClass, HalError, HalResult};
pub use event::{DeviceKind, EventFlag, IoEvent, IoPayload, IOEVENT_MAX_CHARS};
pub use flash::{FlashPage, FlashRegion, FLASH_ERASED_BYTE, FLASH_WORD};
pub use gpio::{LogicalPin, PhysicalPin, PinCapabilities, PinFunction, PinInfo, PinState};
pub use time::SysTime;
pub use uart::TxSource;
