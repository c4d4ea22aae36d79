// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Configuration blob transaction: size, then page-framed payload.
//! No versioning and no integrity check.

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;

use super::Rejection;
use crate::error::Error;
use crate::link::HostLink;
use crate::loader;
use crate::protocol::{Command, FRAME_BAD, FRAME_OK};
use crate::record;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigureOutcome {
    Stored { size: u32, pages: u32 },
    Rejected(Rejection),
}

pub fn handle<T, F>(link: &mut HostLink<T>, storage: &mut Storage<F>) -> Result<ConfigureOutcome, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
{
    link.send_byte(Command::Configure.byte())?;
    let size = link.read_u32_be()?;
    let map = *storage.map();

    if size > map.config_capacity() {
        #[cfg(feature = "defmt")]
        defmt::warn!("Configure: size {} exceeds region capacity {}", size, map.config_capacity());
        link.send_byte(FRAME_BAD)?;
        return Ok(ConfigureOutcome::Rejected(Rejection::TooLarge {
            size,
            capacity: map.config_capacity(),
        }));
    }

    record::store_config_size(storage, size)?;
    link.send_byte(FRAME_OK)?;

    let pages = loader::load(link, storage, map.config_storage(), size)?;
    Ok(ConfigureOutcome::Stored { size, pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RegionMap;
    use crate::sim::{RamFlash, ScriptedLink};

    const MAP: RegionMap = RegionMap::new(0, 256, 4, 2);

    #[test]
    fn stores_size_and_payload() {
        let mut storage = Storage::new(RamFlash::<256>::new(MAP.end() as usize), MAP).unwrap();
        let mut request = 300u32.to_be_bytes().to_vec();
        request.extend((0..300).map(|i| i as u8));
        let mut link = HostLink::new(ScriptedLink::new(&request));

        let outcome = handle(&mut link, &mut storage).unwrap();

        assert_eq!(outcome, ConfigureOutcome::Stored { size: 300, pages: 2 });
        assert_eq!(link.get_ref().sent(), &[b'C', FRAME_OK, FRAME_OK, FRAME_OK]);
        assert_eq!(record::read_config_size(&mut storage).unwrap(), 300);
    }

    #[test]
    fn oversized_blob_is_rejected() {
        let mut storage = Storage::new(RamFlash::<256>::new(MAP.end() as usize), MAP).unwrap();
        let mut link = HostLink::new(ScriptedLink::new(&(MAP.config_capacity() + 1).to_be_bytes()));

        let outcome = handle(&mut link, &mut storage).unwrap();

        assert!(matches!(outcome, ConfigureOutcome::Rejected(Rejection::TooLarge { .. })));
        assert_eq!(link.get_ref().sent(), &[b'C', FRAME_BAD]);
        assert!(storage.flash().ops().is_empty());
    }
}
