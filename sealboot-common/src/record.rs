// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Persisted firmware and configuration records.
//!
//! Metadata words are stored little-endian. An erased version slot
//! (`0xFFFF_FFFF`) means no firmware has been installed yet.

use embedded_storage::nor_flash::MultiwriteNorFlash;
use heapless::Vec;

use crate::error::Error;
use crate::integrity::{Digest, DIGEST_LEN};
use crate::layout::COMMIT_OFFSET;
use crate::protocol::{MESSAGE_TERMINATOR, METADATA_HEADER_LEN, RELEASE_MESSAGE_BUF};
use crate::storage::{erased_page, Storage, ERASED_WORD};

/// Programmed into the digest page once the payload has passed verification.
pub const COMMIT_MARKER: u32 = 0x5EA1_B007;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FirmwareMetadata {
    pub size: u32,
    pub version: u32,
}

/// Where a release message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessagePlacement {
    /// Message and terminator fit behind the metadata header.
    SinglePage,
    /// The first page was filled and `spilled` bytes went to the spill page.
    Spilled { spilled: u32 },
}

pub fn read_firmware_metadata<F: MultiwriteNorFlash>(storage: &mut Storage<F>) -> Result<FirmwareMetadata, Error> {
    let map = *storage.map();
    Ok(FirmwareMetadata {
        size: storage.read_u32(map.firmware_size())?,
        version: storage.read_u32(map.firmware_version())?,
    })
}

/// Stored firmware version, with an erased slot read as `oldest_version`.
pub fn current_version<F: MultiwriteNorFlash>(storage: &mut Storage<F>, oldest_version: u32) -> Result<u32, Error> {
    let map = *storage.map();
    let version = storage.read_u32(map.firmware_version())?;
    Ok(if version == ERASED_WORD { oldest_version } else { version })
}

/// Erase the digest page and store `digest`. This also clears the commit marker.
pub fn store_digest<F: MultiwriteNorFlash>(storage: &mut Storage<F>, digest: &Digest) -> Result<(), Error> {
    let page_size = storage.page_size();
    let addr = storage.map().firmware_digest();
    let mut page = erased_page();
    page[..DIGEST_LEN].copy_from_slice(digest);
    storage.write_page(addr, &page[..page_size])
}

pub fn read_digest<F: MultiwriteNorFlash>(storage: &mut Storage<F>) -> Result<Digest, Error> {
    let addr = storage.map().firmware_digest();
    let mut digest = [0u8; DIGEST_LEN];
    storage.read(addr, &mut digest)?;
    Ok(digest)
}

/// Program the commit marker on top of the stored digest.
pub fn commit<F: MultiwriteNorFlash>(storage: &mut Storage<F>) -> Result<(), Error> {
    let page_size = storage.page_size();
    let addr = storage.map().firmware_digest();
    let mut page = erased_page();
    let at = COMMIT_OFFSET as usize;
    page[at..at + 4].copy_from_slice(&COMMIT_MARKER.to_le_bytes());
    storage.program_page(addr, &page[..page_size])
}

pub fn is_committed<F: MultiwriteNorFlash>(storage: &mut Storage<F>) -> Result<bool, Error> {
    let addr = storage.map().firmware_commit();
    Ok(storage.read_u32(addr)? == COMMIT_MARKER)
}

/// Erase the metadata page and write version, size and the NUL-terminated
/// release message. A message that does not fit behind the header fills the
/// metadata page and continues on the spill page, which is erased first.
///
/// The caller bounds `message` by the region map's release message capacity.
pub fn store_metadata<F: MultiwriteNorFlash>(
    storage: &mut Storage<F>,
    version: u32,
    size: u32,
    message: &[u8],
) -> Result<MessagePlacement, Error> {
    let map = *storage.map();
    let page_size = storage.page_size();
    let header = METADATA_HEADER_LEN as usize;
    let first_capacity = map.release_message_first_page() as usize;
    let stored_len = message.len() + 1;

    let mut page = erased_page();
    page[..4].copy_from_slice(&size.to_le_bytes());
    page[4..8].copy_from_slice(&version.to_le_bytes());

    let mut terminated: Vec<u8, RELEASE_MESSAGE_BUF> = Vec::new();
    // Bounded by the caller; the terminator always has room.
    let _ = terminated.extend_from_slice(message);
    let _ = terminated.push(MESSAGE_TERMINATOR);
    let terminated = terminated.as_slice();

    if stored_len <= first_capacity {
        page[header..header + stored_len].copy_from_slice(terminated);
        storage.write_page(map.firmware_metadata(), &page[..page_size])?;
        return Ok(MessagePlacement::SinglePage);
    }

    let (first, rest) = terminated.split_at(first_capacity);
    page[header..header + first.len()].copy_from_slice(first);
    storage.write_page(map.firmware_metadata(), &page[..page_size])?;

    // The spill is programmed as a full page, so the word rounding of the
    // remainder is implicit: everything past it stays erased.
    let mut spill = erased_page();
    spill[..rest.len()].copy_from_slice(rest);
    storage.write_page(map.release_message_spill(), &spill[..page_size])?;

    Ok(MessagePlacement::Spilled {
        spilled: rest.len() as u32,
    })
}

/// Read the release message up to its terminator. The message area is
/// contiguous across the metadata and spill pages.
pub fn read_release_message<F: MultiwriteNorFlash>(
    storage: &mut Storage<F>,
) -> Result<Vec<u8, RELEASE_MESSAGE_BUF>, Error> {
    let map = *storage.map();
    let mut message = Vec::new();
    let mut chunk = [0u8; 64];
    let limit = (map.release_message_capacity() as usize).min(RELEASE_MESSAGE_BUF - 1);
    let mut addr = map.release_message();

    while message.len() < limit {
        let n = (limit - message.len()).min(chunk.len());
        storage.read(addr, &mut chunk[..n])?;

        for &byte in &chunk[..n] {
            if byte == MESSAGE_TERMINATOR {
                return Ok(message);
            }
            // Cannot overflow: `limit` is below the buffer capacity.
            let _ = message.push(byte);
        }
        addr += n as u32;
    }

    Ok(message)
}

/// Erase the configuration metadata page and store the blob size.
pub fn store_config_size<F: MultiwriteNorFlash>(storage: &mut Storage<F>, size: u32) -> Result<(), Error> {
    let page_size = storage.page_size();
    let addr = storage.map().config_size();
    let mut page = erased_page();
    page[..4].copy_from_slice(&size.to_le_bytes());
    storage.write_page(addr, &page[..page_size])
}

pub fn read_config_size<F: MultiwriteNorFlash>(storage: &mut Storage<F>) -> Result<u32, Error> {
    let addr = storage.map().config_size();
    storage.read_u32(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RegionMap;
    use crate::sim::RamFlash;

    const MAP: RegionMap = RegionMap::new(0, 256, 4, 2);

    fn storage() -> Storage<RamFlash<256>> {
        Storage::new(RamFlash::new(MAP.end() as usize), MAP).unwrap()
    }

    #[test]
    fn erased_version_reads_as_oldest() {
        let mut storage = storage();
        assert_eq!(current_version(&mut storage, 3).unwrap(), 3);

        store_metadata(&mut storage, 7, 16, b"").unwrap();
        assert_eq!(current_version(&mut storage, 3).unwrap(), 7);
    }

    #[test]
    fn short_message_stays_in_metadata_page() {
        let mut storage = storage();
        let placement = store_metadata(&mut storage, 1, 64, b"hello").unwrap();

        assert_eq!(placement, MessagePlacement::SinglePage);
        assert!(!storage.flash().touched(MAP.release_message_spill(), MAP.firmware_storage()));

        let at = MAP.release_message() as usize;
        assert_eq!(&storage.flash().data()[at..at + 6], b"hello\0");
        assert_eq!(read_release_message(&mut storage).unwrap().as_slice(), b"hello");
    }

    #[test]
    fn message_filling_first_page_exactly_does_not_spill() {
        let mut storage = storage();
        // 247 bytes plus terminator equals the 248 bytes behind the header.
        let message = [b'a'; 247];
        let placement = store_metadata(&mut storage, 1, 0, &message).unwrap();
        assert_eq!(placement, MessagePlacement::SinglePage);
    }

    #[test]
    fn long_message_spills_to_second_page() {
        let mut storage = storage();
        let message: std::vec::Vec<u8> = (0..300u32).map(|i| b'A' + (i % 26) as u8).collect();

        let placement = store_metadata(&mut storage, 2, 64, &message).unwrap();
        assert_eq!(placement, MessagePlacement::Spilled { spilled: 301 - 248 });

        let data = storage.flash().data();
        let first = MAP.release_message() as usize;
        let spill = MAP.release_message_spill() as usize;
        assert_eq!(&data[first..first + 248], &message[..248]);
        assert_eq!(&data[spill..spill + 52], &message[248..]);
        assert_eq!(data[spill + 52], 0);
        assert_eq!(data[spill + 53], 0xFF);

        assert_eq!(read_release_message(&mut storage).unwrap().as_slice(), message.as_slice());
    }

    #[test]
    fn commit_marker_survives_alongside_digest() {
        let mut storage = storage();
        let digest = [0x42u8; 32];
        store_digest(&mut storage, &digest).unwrap();
        assert!(!is_committed(&mut storage).unwrap());

        commit(&mut storage).unwrap();
        assert!(is_committed(&mut storage).unwrap());
        assert_eq!(read_digest(&mut storage).unwrap(), digest);

        store_digest(&mut storage, &digest).unwrap();
        assert!(!is_committed(&mut storage).unwrap());
    }
}
