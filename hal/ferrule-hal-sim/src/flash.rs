//! NOR flash image in host memory
//!
//! Erased bytes read 0xFF, writes can only clear bits and erase works in
//! whole 4 KB pages, so code under test sees real NOR behaviour.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};
use ferrule_hal::FLASH_ERASED_BYTE;

struct FlashState {
    data: Vec<u8>,
    erases: usize,
}

#[derive(Clone)]
pub struct SimFlash {
    state: Arc<Mutex<FlashState>>,
}

impl SimFlash {
    pub const PAGE_SIZE: usize = 4096;

    /// 2 MB part
    pub const DEFAULT_CAPACITY: usize = 2 * 1024 * 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FlashState {
                data: vec![FLASH_ERASED_BYTE; capacity],
                erases: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FlashState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw bytes of the image, bypassing alignment rules
    pub fn contents(&self, offset: usize, len: usize) -> Vec<u8> {
        self.state().data[offset..offset + len].to_vec()
    }

    /// Page erases performed so far
    pub fn erase_count(&self) -> usize {
        self.state().erases
    }
}

impl ErrorType for SimFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for SimFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(&*self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.state().data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.state().data.len()
    }
}

impl NorFlash for SimFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(&*self, from, to)?;
        let mut state = self.state();
        state.data[from as usize..to as usize].fill(FLASH_ERASED_BYTE);
        state.erases += (to - from) as usize / Self::PAGE_SIZE;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(&*self, offset, bytes.len())?;
        let start = offset as usize;
        let mut state = self.state();
        for (cell, &byte) in state.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_only_clears_bits() {
        let mut flash = SimFlash::new(2 * SimFlash::PAGE_SIZE);
        flash.write(0, &[0x0F, 0xF0, 0xFF, 0x00]).unwrap();
        flash.write(0, &[0xFF, 0x3C, 0xFF, 0xFF]).unwrap();
        assert_eq!(flash.contents(0, 4), vec![0x0F, 0x30, 0xFF, 0x00]);

        flash.erase(0, 4096).unwrap();
        assert_eq!(flash.contents(0, 4), vec![0xFF; 4]);
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn test_alignment_and_bounds() {
        let mut flash = SimFlash::new(SimFlash::PAGE_SIZE);
        assert_eq!(flash.write(2, &[0; 4]), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(flash.erase(0, 100), Err(NorFlashErrorKind::NotAligned));
        let mut buf = [0u8; 8];
        assert_eq!(
            flash.read(4092, &mut buf),
            Err(NorFlashErrorKind::OutOfBounds)
        );
    }
}
