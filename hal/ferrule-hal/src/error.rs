//! Error taxonomy shared by every board port
//!
//! No error here is fatal to the process. The interpreter decides whether a
//! failed hardware call becomes a user-visible exception.

use crate::event::EventFlag;
use crate::gpio::{LogicalPin, PinState};

/// Result alias used throughout the contract
pub type HalResult<T> = Result<T, HalError>;

/// Errors returned by board operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Logical pin is not in the board's pin table
    #[error("unknown pin {0:?}")]
    UnknownPin(LogicalPin),
    /// The board cannot put this pin into the requested state
    #[error("pin {pin:?} does not support {state:?}")]
    UnsupportedState { pin: LogicalPin, state: PinState },
    /// Pin table names a logical or physical pin twice
    #[error("pin table maps {0:?} more than once")]
    DuplicatePin(LogicalPin),
    /// Pin table is larger than the board arena
    #[error("pin table too large")]
    PinTableFull,
    /// Unwatch requested for a pin that is not watched
    #[error("pin {0:?} is not watched")]
    NotWatched(LogicalPin),
    /// Every watch slot is bound
    #[error("no free watch slot")]
    NoFreeWatch,
    /// Bus operation on a device that was never set up
    #[error("device {0:?} is not initialised")]
    NotInitialised(EventFlag),
    /// Flag names a device of a different kind than the operation expects
    #[error("{0:?} is not a device of the expected kind")]
    WrongDevice(EventFlag),
    /// Flag names a device the board does not have
    #[error("board has no device {0:?}")]
    NoSuchDevice(EventFlag),
    /// Bus driver cannot realize the requested configuration
    #[error("{0:?} rejected its configuration")]
    Rejected(EventFlag),
    /// I2C address does not fit in 7 bits
    #[error("invalid 7-bit address {0:#x}")]
    InvalidAddress(u8),
    /// A blocking request would stall the idle loop for too long
    #[error("blocking for {requested_us}us exceeds {limit_us}us")]
    TooLong { requested_us: u64, limit_us: u64 },
    /// Board description could not be parsed or is inconsistent
    #[error("invalid board description")]
    Config,
    /// Flash access address or length violates word alignment
    #[error("flash access at {addr:#x} (+{len}) is not word aligned")]
    Alignment { addr: u32, len: u32 },
    /// Flash access falls outside the storage window
    #[error("flash access at {addr:#x} (+{len}) is out of range")]
    OutOfRange { addr: u32, len: u32 },
    /// Address is not inside any flash page
    #[error("no flash page at {0:#x}")]
    NoSuchPage(u32),
    /// Inbound event queue is full; the event was dropped and counted
    #[error("event queue full")]
    QueueFull,
    /// Buffered data exceeds what the device can hold
    #[error("buffer too long for {0:?}")]
    BufferTooLong(EventFlag),
    /// Peripheral reported a timeout
    #[error("hardware timeout on {0:?}")]
    HardwareTimeout(EventFlag),
    /// Peripheral reported a bus fault
    #[error("bus fault on {0:?}")]
    Bus(EventFlag),
    /// Pin driver rejected the request
    #[error("gpio driver fault on {0:?}")]
    Gpio(LogicalPin),
    /// Flash driver reported a fault
    #[error("flash driver fault")]
    Flash,
}

/// Coarse error class, used by the interpreter to pick a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorClass {
    /// Caller asked for something the board is not set up for; never retried
    Configuration,
    /// Caller broke a flash alignment or range precondition
    Alignment,
    /// A bounded queue or buffer overflowed
    Capacity,
    /// Peripheral did not answer in time
    HardwareTimeout,
    /// Peripheral reported a fault
    Hardware,
}

impl HalError {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        use HalError::*;
        match self {
            UnknownPin(_) | UnsupportedState { .. } | DuplicatePin(_) | PinTableFull
            | NotWatched(_) | NoFreeWatch | NotInitialised(_) | WrongDevice(_)
            | NoSuchDevice(_) | Rejected(_) | InvalidAddress(_) | TooLong { .. } | Config => {
                ErrorClass::Configuration
            }
            Alignment { .. } | OutOfRange { .. } | NoSuchPage(_) => ErrorClass::Alignment,
            QueueFull | BufferTooLong(_) => ErrorClass::Capacity,
            HardwareTimeout(_) => ErrorClass::HardwareTimeout,
            Bus(_) | Gpio(_) | Flash => ErrorClass::Hardware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors() {
        assert_eq!(
            HalError::UnknownPin(LogicalPin(40)).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            HalError::NotInitialised(EventFlag::Spi(1)).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            HalError::Rejected(EventFlag::I2c(1)).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            HalError::UnsupportedState {
                pin: LogicalPin(2),
                state: PinState::DacOut
            }
            .class(),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn test_other_classes() {
        assert_eq!(
            HalError::Alignment { addr: 3, len: 4 }.class(),
            ErrorClass::Alignment
        );
        assert_eq!(HalError::NoSuchPage(0x10_0000).class(), ErrorClass::Alignment);
        assert_eq!(HalError::QueueFull.class(), ErrorClass::Capacity);
        assert_eq!(
            HalError::HardwareTimeout(EventFlag::Serial(1)).class(),
            ErrorClass::HardwareTimeout
        );
        assert_eq!(HalError::Bus(EventFlag::I2c(1)).class(), ErrorClass::Hardware);
    }
}
