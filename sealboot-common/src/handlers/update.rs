// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware update transaction.
//!
//! ```text
//! host                                   device
//!  'U'                          ------>
//!                               <------  'U'
//!  version u16, size u32 (BE)
//!  release message '\n'
//!  digest (64 hex chars) '\n'   ------>
//!                               <------  0x00 (or 0x01: rejected, done)
//!  frame 0 .. frame n           ------>
//!                               <------  0x00 per frame
//!                               <------  0x00 verified / 0x01 failed
//! ```

use embedded_io::{Read, Write};
use embedded_storage::nor_flash::MultiwriteNorFlash;
use heapless::Vec;

use super::Rejection;
use crate::config::Config;
use crate::error::Error;
use crate::integrity::{self, Digest, Verification, DIGEST_LEN};
use crate::link::{HostLink, LineStatus};
use crate::loader;
use crate::protocol::{Command, DIGEST_HEX_LEN, FRAME_BAD, FRAME_OK, MAX_RELEASE_MESSAGE_LEN};
use crate::record::{self, MessagePlacement};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateOutcome {
    /// Nothing was written to flash.
    Rejected(Rejection),
    /// Metadata and payload were written; only a verified image is committed.
    Installed {
        version: u32,
        size: u32,
        placement: MessagePlacement,
        verification: Verification,
    },
}

/// Header fields received before any flash is touched.
struct UpdateHeader {
    candidate: u32,
    size: u32,
    message: Vec<u8, MAX_RELEASE_MESSAGE_LEN>,
    message_status: LineStatus,
    digest_line: Vec<u8, DIGEST_HEX_LEN>,
    digest_status: LineStatus,
}

impl UpdateHeader {
    fn receive<T: Read + Write>(link: &mut HostLink<T>) -> Result<Self, Error> {
        let candidate = u32::from(link.read_u16_be()?);
        let size = link.read_u32_be()?;

        let mut message = Vec::new();
        let message_status = link.read_line(&mut message)?;
        let mut digest_line = Vec::new();
        let digest_status = link.read_line(&mut digest_line)?;

        Ok(Self {
            candidate,
            size,
            message,
            message_status,
            digest_line,
            digest_status,
        })
    }

    fn digest(&self) -> Option<Digest> {
        if self.digest_status != LineStatus::Complete || self.digest_line.len() != DIGEST_HEX_LEN {
            return None;
        }
        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(&self.digest_line, &mut digest).ok()?;
        Some(digest)
    }
}

fn reject<T: Read + Write>(link: &mut HostLink<T>, rejection: Rejection) -> Result<UpdateOutcome, Error> {
    #[cfg(feature = "defmt")]
    defmt::warn!("Update rejected: {:?}", rejection);
    link.send_byte(FRAME_BAD)?;
    Ok(UpdateOutcome::Rejected(rejection))
}

/// Run one update transaction after the `'U'` command byte.
pub fn handle<T, F>(link: &mut HostLink<T>, storage: &mut Storage<F>, config: &Config) -> Result<UpdateOutcome, Error>
where
    T: Read + Write,
    F: MultiwriteNorFlash,
{
    link.send_byte(Command::Update.byte())?;
    let header = UpdateHeader::receive(link)?;
    let map = *storage.map();

    let current = record::current_version(storage, config.oldest_version)?;
    if header.candidate != 0 && header.candidate < current {
        return reject(
            link,
            Rejection::StaleVersion {
                candidate: header.candidate,
                current,
            },
        );
    }

    if header.size > map.firmware_capacity() {
        return reject(
            link,
            Rejection::TooLarge {
                size: header.size,
                capacity: map.firmware_capacity(),
            },
        );
    }

    let stored_message_len = header.message.len() as u32 + 1;
    if header.message_status == LineStatus::Overflow || stored_message_len > map.release_message_capacity() {
        return reject(link, Rejection::MessageTooLong);
    }

    let Some(digest) = header.digest() else {
        return reject(link, Rejection::MalformedDigest);
    };

    // Version 0 keeps whatever is installed.
    let version = if header.candidate == 0 { current } else { header.candidate };

    record::store_digest(storage, &digest)?;
    let placement = record::store_metadata(storage, version, header.size, &header.message)?;
    link.send_byte(FRAME_OK)?;

    #[cfg(feature = "defmt")]
    defmt::println!("Update: version={}, size={}, {:?}", version, header.size, placement);

    loader::load(link, storage, map.firmware_storage(), header.size)?;

    let verification = integrity::decrypt_and_verify_stored(storage, &config.key)?;
    if verification.is_verified() {
        record::commit(storage)?;
        link.send_byte(FRAME_OK)?;
    } else {
        link.send_byte(FRAME_BAD)?;
    }

    #[cfg(feature = "defmt")]
    defmt::println!("Update: payload {:?}", verification);

    Ok(UpdateOutcome::Installed {
        version,
        size: header.size,
        placement,
        verification,
    })
}
