// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Page loader: streams host data into flash one page-sized frame at a time.

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;

use crate::error::Error;
use crate::link::HostLink;
use crate::protocol::FRAME_OK;
use crate::storage::{erased_page, Storage, ERASED_BYTE};

/// Receive `size` bytes from the host into flash starting at page `dst`.
///
/// Each frame is `min(remaining, page)` bytes; a short final frame is padded
/// with `0xFF` before its page is erased and programmed. The host gets one
/// [`FRAME_OK`] per programmed page. The destination capacity is the
/// caller's concern. Returns the number of pages written.
pub fn load<T, F>(link: &mut HostLink<T>, storage: &mut Storage<F>, dst: u32, size: u32) -> Result<u32, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
{
    let page_size = storage.page_size();
    let mut buf = erased_page();
    let mut addr = dst;
    let mut remaining = size as usize;
    let mut pages = 0;

    while remaining > 0 {
        let frame = remaining.min(page_size);
        let page = &mut buf[..page_size];

        link.read_exact(&mut page[..frame])?;
        page[frame..].fill(ERASED_BYTE);

        storage.write_page(addr, page)?;
        #[cfg(feature = "defmt")]
        defmt::trace!("Frame {} programmed at 0x{:08x}", pages, addr);

        addr += page_size as u32;
        remaining -= frame;
        pages += 1;
        link.send_byte(FRAME_OK)?;
    }

    Ok(pages)
}
