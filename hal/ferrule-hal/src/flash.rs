//! Flash page abstractions
//!
//! Boards expose a window of page-erasable non-volatile memory to the
//! interpreter's storage layer. Erase works on whole pages only: erasing
//! any address clears the entire page that contains it, never just a byte
//! range. Programming can only clear bits, so data must be written into
//! erased space.
//!
//! Alignment rules:
//! - reads need a 4-byte aligned address
//! - writes need a 4-byte aligned address and a length that is a multiple of 4

use crate::error::{HalError, HalResult};

/// Value every byte reads back as after an erase
pub const FLASH_ERASED_BYTE: u8 = 0xFF;

/// Read/write alignment unit in bytes
pub const FLASH_WORD: u32 = 4;

/// Geometry of one erasable page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashPage {
    /// Address of the first byte of the page
    pub start: u32,
    /// Page size in bytes
    pub size: u32,
}

impl FlashPage {
    pub fn end(&self) -> u32 {
        self.start + self.size
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end()
    }
}

/// Byte range within the flash window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashRegion {
    pub addr: u32,
    pub len: u32,
}

impl FlashRegion {
    pub const fn new(addr: u32, len: u32) -> Self {
        Self { addr, len }
    }

    /// Check the read precondition
    pub fn check_read(&self) -> HalResult<()> {
        if self.addr % FLASH_WORD != 0 {
            return Err(HalError::Alignment {
                addr: self.addr,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Check the write precondition
    pub fn check_write(&self) -> HalResult<()> {
        if self.addr % FLASH_WORD != 0 || self.len % FLASH_WORD != 0 {
            return Err(HalError::Alignment {
                addr: self.addr,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Region lies entirely below `limit`
    pub fn fits_below(&self, limit: u32) -> bool {
        self.addr
            .checked_add(self.len)
            .is_some_and(|end| end <= limit)
    }
}
