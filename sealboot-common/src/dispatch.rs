// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command dispatcher: the bootloader's top-level loop.
//!
//! - `C`: store a configuration blob
//! - `U`: install a firmware image (metadata, payload, verification)
//! - `R`: dump a storage region
//! - `B`: stage the committed image and jump to it
//!
//! Any other byte is dropped without a response.

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;

use crate::config::Config;
use crate::error::Error;
use crate::handlers::{self, BootRefusal, ConfigureOutcome, Launcher, ReadbackOutcome, UpdateOutcome};
use crate::layout::RegionMap;
use crate::link::HostLink;
use crate::protocol::Command;
use crate::storage::Storage;

/// What one pass through the dispatcher did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Served {
    Ignored(u8),
    Configured(ConfigureOutcome),
    Updated(UpdateOutcome),
    ReadBack(ReadbackOutcome),
    BootRefused(BootRefusal),
}

pub struct Bootloader<T, F, X> {
    link: HostLink<T>,
    storage: Storage<F>,
    launcher: X,
    config: Config,
}

impl<T, F, X> Bootloader<T, F, X>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
    X: Launcher,
{
    pub fn new(link: T, flash: F, launcher: X, map: RegionMap, config: Config) -> Result<Self, Error> {
        Ok(Self {
            link: HostLink::new(link),
            storage: Storage::new(flash, map)?,
            launcher,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage_mut(&mut self) -> &mut Storage<F> {
        &mut self.storage
    }

    pub fn link(&self) -> &T {
        self.link.get_ref()
    }

    pub fn link_mut(&mut self) -> &mut T {
        self.link.get_mut()
    }

    pub fn launcher(&self) -> &X {
        &self.launcher
    }

    pub fn into_parts(self) -> (T, F, X) {
        (self.link.into_inner(), self.storage.into_inner(), self.launcher)
    }

    /// Block for one command byte and run its transaction to completion.
    /// A successful boot does not return.
    pub fn serve(&mut self) -> Result<Served, Error> {
        let byte = self.link.read_byte()?;
        let Ok(command) = Command::try_from(byte) else {
            return Ok(Served::Ignored(byte));
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("Command: {:?}", command);

        let served = match command {
            Command::Configure => Served::Configured(handlers::configure::handle(&mut self.link, &mut self.storage)?),
            Command::Update => Served::Updated(handlers::update::handle(&mut self.link, &mut self.storage, &self.config)?),
            Command::Readback => Served::ReadBack(handlers::readback::handle(
                &mut self.link,
                &mut self.storage,
                self.config.readback,
            )?),
            Command::Boot => Served::BootRefused(handlers::boot::handle(
                &mut self.link,
                &mut self.storage,
                &mut self.launcher,
            )?),
        };
        Ok(served)
    }

    /// Serve commands forever. Only the boot handler's jump leaves this loop.
    #[cfg_attr(not(feature = "defmt"), allow(unused_variables))]
    pub fn run(&mut self) -> ! {
        loop {
            match self.serve() {
                Ok(served) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("Served: {:?}", served);
                }
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    defmt::error!("Transaction aborted: {:?}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEVELOPMENT_KEY;
    use crate::handlers::Rejection;
    use crate::integrity::Verification;
    use crate::protocol::{FRAME_BAD, FRAME_OK};
    use crate::protocol::Region;
    use crate::record;
    use crate::sim::{seal_payload, update_request, RamFlash, RamLauncher, ScriptedLink};

    const MAP: RegionMap = RegionMap::new(0, 256, 8, 4);

    type TestBootloader = Bootloader<ScriptedLink, RamFlash<256>, RamLauncher>;

    fn bootloader(input: &[u8]) -> TestBootloader {
        Bootloader::new(
            ScriptedLink::new(input),
            RamFlash::new(MAP.end() as usize),
            RamLauncher::new(0x2000_4000, 2048),
            MAP,
            Config::default(),
        )
        .unwrap()
    }

    #[test]
    fn unknown_bytes_are_ignored() {
        let mut bl = bootloader(b"xZ\n");

        assert_eq!(bl.serve(), Ok(Served::Ignored(b'x')));
        assert_eq!(bl.serve(), Ok(Served::Ignored(b'Z')));
        assert_eq!(bl.serve(), Ok(Served::Ignored(b'\n')));
        assert_eq!(bl.serve(), Err(Error::Disconnected));
        assert!(bl.link().sent().is_empty());
    }

    #[test]
    fn configure_then_readback_round_trips() {
        let mut input = std::vec![b'C'];
        input.extend_from_slice(&8u32.to_be_bytes());
        input.extend_from_slice(b"DEADBEEF");
        input.extend_from_slice(b"RC");
        input.extend_from_slice(&8u32.to_be_bytes());
        let mut bl = bootloader(&input);

        assert_eq!(bl.serve(), Ok(Served::Configured(ConfigureOutcome::Stored { size: 8, pages: 1 })));
        assert_eq!(
            bl.serve(),
            Ok(Served::ReadBack(ReadbackOutcome::Sent {
                region: Region::Configuration,
                size: 8
            }))
        );

        let sent = bl.link_mut().take_sent();
        assert_eq!(&sent[..3], &[b'C', FRAME_OK, FRAME_OK]);
        assert_eq!(&sent[3..], b"RCDEADBEEF");
    }

    #[test]
    fn configure_deadbeef_reads_back_four_bytes() {
        let mut input = std::vec![b'C'];
        input.extend_from_slice(&4u32.to_be_bytes());
        input.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        input.extend_from_slice(b"RC");
        input.extend_from_slice(&8u32.to_be_bytes());
        let mut bl = bootloader(&input);

        bl.serve().unwrap();
        bl.serve().unwrap();

        // Readback ignores the recorded size: the padded tail comes back as erased flash.
        let sent = bl.link_mut().take_sent();
        assert_eq!(&sent[5..], &[0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn rollback_is_rejected_after_accepted_update() {
        let (cipher, digest) = seal_payload(b"firmware image v5", &DEVELOPMENT_KEY);
        let mut input = std::vec![b'U'];
        input.extend(update_request(5, b"five", &digest, &cipher));
        input.push(b'U');
        input.extend(update_request(3, b"three", &digest, &cipher));
        let mut bl = bootloader(&input);

        assert!(matches!(
            bl.serve(),
            Ok(Served::Updated(UpdateOutcome::Installed {
                version: 5,
                verification: Verification::Verified,
                ..
            }))
        ));
        bl.link_mut().take_sent();

        assert_eq!(
            bl.serve(),
            Ok(Served::Updated(UpdateOutcome::Rejected(Rejection::StaleVersion {
                candidate: 3,
                current: 5
            })))
        );
        assert_eq!(bl.link().sent(), &[b'U', FRAME_BAD]);
        assert_eq!(record::current_version(bl.storage_mut(), 0), Ok(5));
    }

    #[test]
    fn boot_without_firmware_returns_to_loop() {
        let mut bl = bootloader(b"BB");

        assert_eq!(bl.serve(), Ok(Served::BootRefused(BootRefusal::NotCommitted)));
        assert_eq!(bl.serve(), Ok(Served::BootRefused(BootRefusal::NotCommitted)));
        assert_eq!(bl.link().sent(), &[b'B', FRAME_BAD, b'B', FRAME_BAD]);
    }

    #[test]
    #[should_panic(expected = "launch")]
    fn boot_after_update_launches() {
        let (cipher, digest) = seal_payload(&[0x5A; 100], &DEVELOPMENT_KEY);
        let mut input = std::vec![b'U'];
        input.extend(update_request(1, b"hello", &digest, &cipher));
        input.push(b'B');
        let mut bl = bootloader(&input);

        bl.serve().unwrap();
        let _ = bl.serve();
    }
}
