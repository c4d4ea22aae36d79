// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Readback transaction: dump raw bytes from the start of a storage region.
//!
//! The transfer is not bounded by the recorded payload size, only (under
//! [`ReadbackPolicy::WithinRegion`]) by the region capacity.

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;

use crate::config::ReadbackPolicy;
use crate::error::Error;
use crate::link::HostLink;
use crate::protocol::{Command, Region};
use crate::storage::Storage;

const CHUNK_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadbackOutcome {
    Sent { region: Region, size: u32 },
    /// The selector byte named no region; nothing else was exchanged.
    UnknownRegion(u8),
    /// The request reached past the region and was dropped without a response.
    OutOfRange { region: Region, size: u32, capacity: u32 },
}

pub fn handle<T, F>(
    link: &mut HostLink<T>,
    storage: &mut Storage<F>,
    policy: ReadbackPolicy,
) -> Result<ReadbackOutcome, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
{
    link.send_byte(Command::Readback.byte())?;

    let selector = link.read_byte()?;
    let Ok(region) = Region::try_from(selector) else {
        return Ok(ReadbackOutcome::UnknownRegion(selector));
    };
    link.send_byte(region.byte())?;

    let size = link.read_u32_be()?;
    let (base, capacity) = storage.map().region(region);

    if policy == ReadbackPolicy::WithinRegion && size > capacity {
        #[cfg(feature = "defmt")]
        defmt::warn!("Readback: {} bytes requested from {:?}, capacity {}", size, region, capacity);
        return Ok(ReadbackOutcome::OutOfRange { region, size, capacity });
    }

    let mut chunk = [0u8; CHUNK_SIZE];
    let mut addr = base;
    let mut remaining = size as usize;

    while remaining > 0 {
        let n = remaining.min(CHUNK_SIZE);
        storage.read(addr, &mut chunk[..n])?;
        link.send(&chunk[..n])?;
        addr += n as u32;
        remaining -= n;
    }

    Ok(ReadbackOutcome::Sent { region, size })
}
