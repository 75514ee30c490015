//! UART serial configuration and the transmit-drain seam
//!
//! Serial output is buffered by the interpreter. A board "kicks" a device
//! to drain that buffer: it repeatedly asks the [`TxSource`] for the next
//! byte and writes it out until the source has none left.

use crate::event::EventFlag;
use crate::gpio::LogicalPin;

/// Interpreter-side pending-transmit buffer
pub trait TxSource {
    /// Next byte queued for `device`, or `None` when the buffer is empty
    fn next_char(&mut self, device: EventFlag) -> Option<u8>;
}

/// Serial line settings plus optional pin routing
///
/// The frame settings go to the vendor driver on setup. The pins, when
/// given, are switched to their serial states if the board supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    pub baudrate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// XON/XOFF software flow control
    pub flow_control: bool,
    pub rx_pin: Option<LogicalPin>,
    pub tx_pin: Option<LogicalPin>,
}

impl Default for UartConfig {
    /// 115200 8N1, no flow control
    fn default() -> Self {
        Self {
            baudrate: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: false,
            rx_pin: None,
            tx_pin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
