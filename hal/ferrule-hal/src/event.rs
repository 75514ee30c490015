//! Event flags and inbound I/O events
//!
//! An [`EventFlag`] is the handle the interpreter uses to address a bus
//! device (`SERIAL1`, `SPI1`, `I2C1`, ...) or the event stream of one
//! watched pin. Hardware-originated data reaches the interpreter as
//! [`IoEvent`]s pushed into the board's inbound queue.

use heapless::Vec;

use crate::time::SysTime;

/// Maximum characters carried by a single event
///
/// Longer serial input is split into several events, in order.
pub const IOEVENT_MAX_CHARS: usize = 4;

/// Handle addressing a device or a watched pin
///
/// Bus device numbers are 1-based, as the interpreter names them.
/// Watch slots are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventFlag {
    Serial(u8),
    Spi(u8),
    I2c(u8),
    PinWatch(u8),
}

/// Kind of device an [`EventFlag`] addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceKind {
    Serial,
    Spi,
    I2c,
    PinWatch,
}

impl EventFlag {
    pub const SERIAL1: Self = EventFlag::Serial(1);
    pub const SERIAL2: Self = EventFlag::Serial(2);
    pub const SPI1: Self = EventFlag::Spi(1);
    pub const I2C1: Self = EventFlag::I2c(1);

    pub fn kind(self) -> DeviceKind {
        match self {
            EventFlag::Serial(_) => DeviceKind::Serial,
            EventFlag::Spi(_) => DeviceKind::Spi,
            EventFlag::I2c(_) => DeviceKind::I2c,
            EventFlag::PinWatch(_) => DeviceKind::PinWatch,
        }
    }

    /// Zero-based index within the device kind
    ///
    /// Returns `None` for bus device number 0, which no board defines.
    pub fn index(self) -> Option<usize> {
        match self {
            EventFlag::Serial(n) | EventFlag::Spi(n) | EventFlag::I2c(n) => {
                (n as usize).checked_sub(1)
            }
            EventFlag::PinWatch(slot) => Some(slot as usize),
        }
    }

    pub fn is_pin_watch(self) -> bool {
        matches!(self, EventFlag::PinWatch(_))
    }
}

/// What an event carries
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoPayload {
    /// Received bytes, at most [`IOEVENT_MAX_CHARS`]
    Chars(Vec<u8, IOEVENT_MAX_CHARS>),
    /// Watched pin edge, with the level latched when it occurred
    Edge { level: bool },
}

/// One delivered unit of hardware-originated data
///
/// Created at interrupt or poll time and handed to the interpreter;
/// boards do not keep events after delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IoEvent {
    pub flag: EventFlag,
    pub time_us: SysTime,
    pub payload: IoPayload,
}

impl IoEvent {
    /// Character event; `None` if `chars` does not fit in one event
    pub fn chars(flag: EventFlag, time_us: SysTime, chars: &[u8]) -> Option<Self> {
        let chars = Vec::from_slice(chars).ok()?;
        Some(Self {
            flag,
            time_us,
            payload: IoPayload::Chars(chars),
        })
    }

    /// Pin edge event
    pub fn edge(flag: EventFlag, time_us: SysTime, level: bool) -> Self {
        Self {
            flag,
            time_us,
            payload: IoPayload::Edge { level },
        }
    }

    /// Bytes carried by a character event, empty otherwise
    pub fn char_bytes(&self) -> &[u8] {
        match &self.payload {
            IoPayload::Chars(chars) => chars,
            IoPayload::Edge { .. } => &[],
        }
    }
}
