//! SPI configuration
//!
//! SPI sends are pipelined: each send returns the byte received during the
//! previous transfer, so a caller streaming bytes reads one transfer behind.

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    pub mode: Mode,
    /// Most significant bit first; also orders the two bytes of a 16-bit word
    pub msb_first: bool,
    pub word_size: WordSize,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000,
            mode: Mode::Mode0,
            msb_first: true,
            word_size: WordSize::Eight,
        }
    }
}

/// Bits clocked per send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordSize {
    Eight,
    Sixteen,
}

impl WordSize {
    /// Bytes on the wire per word
    pub const fn bytes(self) -> usize {
        match self {
            WordSize::Eight => 1,
            WordSize::Sixteen => 2,
        }
    }
}

/// Clock polarity and phase, numbered CPOL * 2 + CPHA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}
