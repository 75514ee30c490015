//! Interpreter storage window on NOR flash
//!
//! The interpreter addresses flash by byte offset inside a window the
//! board reserves for it. Pages are the driver's erase unit. Reads need a
//! word-aligned address; writes also need a whole number of words.

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind};
use heapless::Vec;

use ferrule_hal::capability::MAX_FREE_REGIONS;
use ferrule_hal::{FlashPage, FlashRegion, HalError, HalResult};

pub struct FlashStore<F> {
    flash: F,
    base: u32,
    size: u32,
}

impl<F: NorFlash> FlashStore<F> {
    /// Reserve `[base, base + size)` of the part for interpreter storage
    ///
    /// The window must start and end on page boundaries and fit the part.
    pub fn new(flash: F, base: u32, size: u32) -> HalResult<Self> {
        let page = F::ERASE_SIZE as u32;
        let end = base.checked_add(size).ok_or(HalError::Config)?;
        if page == 0 || base % page != 0 || size % page != 0 || end as usize > flash.capacity() {
            error!("flash window {} +{} does not fit the part", base, size);
            return Err(HalError::Config);
        }
        Ok(Self { flash, base, size })
    }

    pub fn page_size(&self) -> u32 {
        F::ERASE_SIZE as u32
    }

    /// Bytes available to the interpreter
    pub fn max(&self) -> u32 {
        self.size
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> HalResult<()> {
        let region = FlashRegion::new(addr, buf.len() as u32);
        region.check_read()?;
        self.check_range(region)?;
        self.flash
            .read(self.base + addr, buf)
            .map_err(|e| flash_error(region, e.kind()))
    }

    /// Program bytes; bits can only be cleared, erase first to set them
    pub fn write(&mut self, addr: u32, data: &[u8]) -> HalResult<()> {
        let region = FlashRegion::new(addr, data.len() as u32);
        region.check_write()?;
        self.check_range(region)?;
        self.flash
            .write(self.base + addr, data)
            .map_err(|e| flash_error(region, e.kind()))
    }

    pub fn page(&self, addr: u32) -> HalResult<FlashPage> {
        if addr >= self.size {
            return Err(HalError::NoSuchPage(addr));
        }
        let size = self.page_size();
        Ok(FlashPage {
            start: addr - addr % size,
            size,
        })
    }

    pub fn erase_page(&mut self, addr: u32) -> HalResult<()> {
        let page = self.page(addr)?;
        trace!("erasing flash page {}", page.start);
        self.flash
            .erase(self.base + page.start, self.base + page.end())
            .map_err(|e| flash_error(FlashRegion::new(page.start, page.size), e.kind()))
    }

    /// The whole window is free for interpreter use
    pub fn free_regions(&self) -> Vec<FlashRegion, MAX_FREE_REGIONS> {
        let mut regions = Vec::new();
        if self.size > 0 {
            let _ = regions.push(FlashRegion::new(0, self.size));
        }
        regions
    }

    fn check_range(&self, region: FlashRegion) -> HalResult<()> {
        if region.fits_below(self.size) {
            Ok(())
        } else {
            Err(HalError::OutOfRange {
                addr: region.addr,
                len: region.len,
            })
        }
    }
}

fn flash_error(region: FlashRegion, kind: NorFlashErrorKind) -> HalError {
    match kind {
        NorFlashErrorKind::NotAligned => HalError::Alignment {
            addr: region.addr,
            len: region.len,
        },
        NorFlashErrorKind::OutOfBounds => HalError::OutOfRange {
            addr: region.addr,
            len: region.len,
        },
        _ => {
            warn!("flash driver fault at {}", region.addr);
            HalError::Flash
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_hal::FLASH_ERASED_BYTE;
    use ferrule_hal_sim::SimFlash;

    const BASE: u32 = 0x10_0000;
    const SIZE: u32 = 0x4_0000;

    fn store() -> (FlashStore<SimFlash>, SimFlash) {
        let part = SimFlash::new(SimFlash::DEFAULT_CAPACITY);
        (FlashStore::new(part.clone(), BASE, SIZE).unwrap(), part)
    }

    #[test]
    fn test_window_validation() {
        let part = SimFlash::new(SimFlash::DEFAULT_CAPACITY);
        assert!(FlashStore::new(part.clone(), 0x800, 0x1000).is_err());
        assert!(FlashStore::new(part.clone(), 0, 0x1800).is_err());
        assert!(FlashStore::new(part.clone(), 0x1F_F000, 0x2000).is_err());
        assert!(FlashStore::new(part, u32::MAX - 0xFFF, 0x2000).is_err());
    }

    #[test]
    fn test_erase_then_read() {
        let (mut store, part) = store();
        store.write(0x2000, &[1, 2, 3, 4]).unwrap();
        store.erase_page(0x2002).unwrap();

        let mut buf = [0u8; 8];
        store.read(0x2000, &mut buf).unwrap();
        assert_eq!(buf, [FLASH_ERASED_BYTE; 8]);
        assert_eq!(part.erase_count(), 1);
    }

    #[test]
    fn test_write_lands_inside_window() {
        let (mut store, part) = store();
        store.write(0x10, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(
            part.contents((BASE + 0x10) as usize, 4),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
        let mut buf = [0u8; 4];
        store.read(0x10, &mut buf).unwrap();
        assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_alignment_and_range() {
        let (mut store, _part) = store();
        assert_eq!(
            store.write(0x3, &[0; 4]),
            Err(HalError::Alignment { addr: 3, len: 4 })
        );
        assert_eq!(
            store.write(0x4, &[0; 3]),
            Err(HalError::Alignment { addr: 4, len: 3 })
        );
        let mut buf = [0u8; 8];
        assert_eq!(
            store.read(SIZE - 4, &mut buf),
            Err(HalError::OutOfRange {
                addr: SIZE - 4,
                len: 8
            })
        );
    }

    #[test]
    fn test_pages() {
        let (store, _part) = store();
        assert_eq!(
            store.page(0x1000).unwrap(),
            FlashPage {
                start: 0x1000,
                size: 4096
            }
        );
        assert_eq!(store.page(0x1FFF).unwrap().start, 0x1000);
        assert_eq!(store.page(SIZE), Err(HalError::NoSuchPage(SIZE)));
        assert_eq!(store.max(), SIZE);
        assert_eq!(store.free_regions().as_slice(), &[FlashRegion::new(0, SIZE)]);
    }
}
