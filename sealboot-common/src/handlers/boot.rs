// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Boot transaction: stage the committed image in execution RAM, announce its
//! release message and hand over control.

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;

use crate::error::Error;
use crate::integrity::{self, digests_match};
use crate::link::HostLink;
use crate::protocol::{Command, BOOT_MESSAGE_MARKER, FRAME_BAD, MESSAGE_TERMINATOR};
use crate::record;
use crate::storage::Storage;

/// Execution memory and the jump into it.
pub trait Launcher {
    /// RAM the image is copied into before launch.
    fn exec_region(&mut self) -> &mut [u8];

    /// Transfer control to the staged image. Never returns.
    fn launch(&mut self) -> !;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootRefusal {
    /// No update has completed verification since the record was last written.
    NotCommitted,
    /// The recorded size does not fit the firmware region or execution RAM.
    ImageTooLarge { size: u32, capacity: u32 },
    /// The plaintext in flash no longer hashes to the stored digest.
    DigestMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootOutcome {
    Staged { size: u32 },
    Refused(BootRefusal),
}

fn refuse<T: Read + Write>(link: &mut HostLink<T>, refusal: BootRefusal) -> Result<BootOutcome, Error> {
    #[cfg(feature = "defmt")]
    defmt::warn!("Boot refused: {:?}", refusal);
    link.send_byte(FRAME_BAD)?;
    Ok(BootOutcome::Refused(refusal))
}

/// Everything up to the jump: acknowledge, check, copy, announce.
pub fn stage<T, F, X>(link: &mut HostLink<T>, storage: &mut Storage<F>, launcher: &mut X) -> Result<BootOutcome, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
    X: Launcher,
{
    link.send_byte(Command::Boot.byte())?;
    let map = *storage.map();

    if !record::is_committed(storage)? {
        return refuse(link, BootRefusal::NotCommitted);
    }

    let size = record::read_firmware_metadata(storage)?.size;
    let capacity = map.firmware_capacity().min(launcher.exec_region().len() as u32);
    if size > capacity {
        return refuse(link, BootRefusal::ImageTooLarge { size, capacity });
    }

    let expected = record::read_digest(storage)?;
    if !digests_match(&integrity::digest_stored_payload(storage, size)?, &expected) {
        return refuse(link, BootRefusal::DigestMismatch);
    }

    storage.read(map.firmware_storage(), &mut launcher.exec_region()[..size as usize])?;

    link.send_byte(BOOT_MESSAGE_MARKER)?;
    let message = record::read_release_message(storage)?;
    link.send(&message)?;
    link.send_byte(MESSAGE_TERMINATOR)?;

    Ok(BootOutcome::Staged { size })
}

/// Run the boot transaction. Returns only when the image is refused or an
/// I/O error interrupts staging; otherwise control passes to the firmware.
#[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
pub fn handle<T, F, X>(link: &mut HostLink<T>, storage: &mut Storage<F>, launcher: &mut X) -> Result<BootRefusal, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
    X: Launcher,
{
    match stage(link, storage, launcher)? {
        BootOutcome::Staged { size } => {
            #[cfg(feature = "defmt")]
            defmt::println!("Boot: {} bytes staged, jumping to firmware", size);
            launcher.launch()
        }
        BootOutcome::Refused(refusal) => Ok(refusal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEVELOPMENT_KEY};
    use crate::handlers::update;
    use crate::layout::RegionMap;
    use crate::sim::{seal_payload, update_request, RamFlash, RamLauncher, ScriptedLink};

    const MAP: RegionMap = RegionMap::new(0, 256, 8, 4);
    const EXEC_BASE: u32 = 0x2000_4000;

    fn installed(plain: &[u8], message: &[u8]) -> Storage<RamFlash<256>> {
        let mut storage = Storage::new(RamFlash::new(MAP.end() as usize), MAP).unwrap();
        let (cipher, digest) = seal_payload(plain, &DEVELOPMENT_KEY);
        let mut link = HostLink::new(ScriptedLink::new(&update_request(1, message, &digest, &cipher)));
        update::handle(&mut link, &mut storage, &Config::default()).unwrap();
        storage
    }

    #[test]
    fn stages_image_and_announces_release_message() {
        let plain: std::vec::Vec<u8> = (0..200u8).collect();
        let mut storage = installed(&plain, b"release 1.0");
        let mut link = HostLink::new(ScriptedLink::new(&[]));
        let mut launcher = RamLauncher::new(EXEC_BASE, 1024);

        let outcome = stage(&mut link, &mut storage, &mut launcher).unwrap();

        assert_eq!(outcome, BootOutcome::Staged { size: 208 });
        assert_eq!(&launcher.region()[..200], plain.as_slice());
        assert_eq!(link.get_ref().sent(), b"BMrelease 1.0\0");
    }

    #[test]
    fn refuses_uncommitted_record() {
        let mut storage = Storage::new(RamFlash::<256>::new(MAP.end() as usize), MAP).unwrap();
        let mut link = HostLink::new(ScriptedLink::new(&[]));
        let mut launcher = RamLauncher::new(EXEC_BASE, 1024);

        let refusal = handle(&mut link, &mut storage, &mut launcher).unwrap();

        assert_eq!(refusal, BootRefusal::NotCommitted);
        assert_eq!(link.get_ref().sent(), &[b'B', FRAME_BAD]);
        assert!(launcher.region().iter().all(|&b| b == 0));
    }

    #[test]
    fn refuses_image_modified_after_commit() {
        let mut storage = installed(&[0x11; 64], b"");
        let at = MAP.firmware_storage() as usize + 10;
        storage.flash_mut().data_mut()[at] ^= 0xFF;

        let mut link = HostLink::new(ScriptedLink::new(&[]));
        let mut launcher = RamLauncher::new(EXEC_BASE, 1024);

        assert_eq!(handle(&mut link, &mut storage, &mut launcher), Ok(BootRefusal::DigestMismatch));
    }

    #[test]
    fn refuses_image_larger_than_exec_region() {
        let mut storage = installed(&[0x22; 512], b"");
        let mut link = HostLink::new(ScriptedLink::new(&[]));
        let mut launcher = RamLauncher::new(EXEC_BASE, 256);

        assert_eq!(
            handle(&mut link, &mut storage, &mut launcher),
            Ok(BootRefusal::ImageTooLarge { size: 512, capacity: 256 })
        );
    }

    #[test]
    #[should_panic(expected = "launch: jumping to entry 0x20004001")]
    fn jumps_to_thumb_entry_after_staging() {
        let mut storage = installed(&[0x33; 48], b"go");
        let mut link = HostLink::new(ScriptedLink::new(&[]));
        let mut launcher = RamLauncher::new(EXEC_BASE, 1024);

        let _ = handle(&mut link, &mut storage, &mut launcher);
    }
}
