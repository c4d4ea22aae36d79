// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Page-granular access to the flash device.
//!
//! Every write goes through a full page image: the page is erased, then
//! programmed in one operation. Words that must be added to an already
//! programmed page (the commit marker) use [`Storage::program_page`] with
//! `0xFF` everywhere else, which leaves the existing bits untouched on NOR flash.

use embedded_storage::nor_flash::MultiwriteNorFlash;

use crate::error::{flash_error, Error};
use crate::layout::{RegionMap, MAX_PAGE_SIZE};

/// Value of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// Value of an erased flash word.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Scratch buffer sized for the largest supported page.
pub type PageBuffer = [u8; MAX_PAGE_SIZE];

pub const fn erased_page() -> PageBuffer {
    [ERASED_BYTE; MAX_PAGE_SIZE]
}

pub struct Storage<F> {
    flash: F,
    map: RegionMap,
}

impl<F: MultiwriteNorFlash> Storage<F> {
    /// Bind a region map to a flash device, checking that every slot can be
    /// erased and programmed page by page.
    pub fn new(flash: F, map: RegionMap) -> Result<Self, Error> {
        let page = map.page_size() as usize;
        let fits = map.is_page_aligned()
            && page <= MAX_PAGE_SIZE
            && page % F::ERASE_SIZE == 0
            && page % F::WRITE_SIZE == 0
            && map.end() as usize <= flash.capacity();

        if !fits {
            #[cfg(feature = "defmt")]
            defmt::error!("Region map {:?} does not fit the flash device", map);
            return Err(Error::Geometry);
        }

        Ok(Self { flash, map })
    }

    pub fn map(&self) -> &RegionMap {
        &self.map
    }

    pub fn page_size(&self) -> usize {
        self.map.page_size() as usize
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.flash.read(addr, buf).map_err(flash_error)
    }

    /// Read a little-endian word, the layout used by every metadata slot.
    pub fn read_u32(&mut self, addr: u32) -> Result<u32, Error> {
        let mut raw = [0u8; 4];
        self.read(addr, &mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    pub fn erase_page(&mut self, addr: u32) -> Result<(), Error> {
        self.flash
            .erase(addr, addr + self.map.page_size())
            .map_err(flash_error)
    }

    /// Program one full page image at `addr` without erasing it first.
    pub fn program_page(&mut self, addr: u32, page: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(page.len(), self.page_size());
        self.flash.write(addr, page).map_err(flash_error)
    }

    /// Erase the page at `addr` and program `page` into it.
    pub fn write_page(&mut self, addr: u32, page: &[u8]) -> Result<(), Error> {
        self.erase_page(addr)?;
        self.program_page(addr, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::RamFlash;

    #[test]
    fn rejects_map_larger_than_device() {
        let map = RegionMap::new(0, 256, 16, 8);
        let flash = RamFlash::<256>::new(map.end() as usize - 256);
        assert!(matches!(Storage::new(flash, map), Err(Error::Geometry)));
    }

    #[test]
    fn rejects_page_smaller_than_erase_unit() {
        let map = RegionMap::new(0, 128, 16, 8);
        let flash = RamFlash::<256>::new(16 * 1024);
        assert!(matches!(Storage::new(flash, map), Err(Error::Geometry)));
    }

    #[test]
    fn rejects_unaligned_base() {
        let map = RegionMap::new(0x80, 256, 16, 8);
        let flash = RamFlash::<256>::new(16 * 1024);
        assert!(matches!(Storage::new(flash, map), Err(Error::Geometry)));
    }

    #[test]
    fn write_page_replaces_previous_contents() {
        let map = RegionMap::new(0, 256, 4, 4);
        let mut storage = Storage::new(RamFlash::<256>::new(map.end() as usize), map).unwrap();

        let mut page = erased_page();
        page[..4].copy_from_slice(&0x0000_0000u32.to_le_bytes());
        storage.write_page(0, &page[..256]).unwrap();

        page[..4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        storage.write_page(0, &page[..256]).unwrap();

        assert_eq!(storage.read_u32(0).unwrap(), 0x1234_5678);
    }
}
