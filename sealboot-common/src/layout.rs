// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash region map.
//!
//! ```text
//! firmware_base + 0·P   digest page      [digest: 32B][commit: u32][pad]
//!               + 1·P   metadata page    [size: u32][version: u32][release message ...]
//!               + 2·P   spill page       [... release message continued]
//!               + 3·P   firmware storage (firmware_pages · P)
//! config metadata       size page        [size: u32][pad]
//!        + 1·P          config storage   (config_pages · P)
//! ```
//!
//! All addresses are offsets from the start of the flash device. Every slot
//! that is erased or programmed starts on a page boundary as long as
//! `firmware_base` does.

use crate::protocol::{Region, METADATA_HEADER_LEN};

/// Largest logical page the loader can buffer.
pub const MAX_PAGE_SIZE: usize = 4096;

/// Byte offset of the commit word inside the digest page.
pub const COMMIT_OFFSET: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionMap {
    firmware_base: u32,
    page_size: u32,
    firmware_pages: u32,
    config_pages: u32,
}

impl RegionMap {
    pub const fn new(firmware_base: u32, page_size: u32, firmware_pages: u32, config_pages: u32) -> Self {
        Self {
            firmware_base,
            page_size,
            firmware_pages,
            config_pages,
        }
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn is_page_aligned(&self) -> bool {
        self.page_size != 0 && self.firmware_base % self.page_size == 0
    }

    // --- Firmware record ---

    pub const fn firmware_digest(&self) -> u32 {
        self.firmware_base
    }

    pub const fn firmware_commit(&self) -> u32 {
        self.firmware_digest() + COMMIT_OFFSET
    }

    pub const fn firmware_metadata(&self) -> u32 {
        self.firmware_base + self.page_size
    }

    pub const fn firmware_size(&self) -> u32 {
        self.firmware_metadata()
    }

    pub const fn firmware_version(&self) -> u32 {
        self.firmware_metadata() + 4
    }

    pub const fn release_message(&self) -> u32 {
        self.firmware_metadata() + METADATA_HEADER_LEN
    }

    /// Page receiving the part of a release message that overflows the metadata page.
    pub const fn release_message_spill(&self) -> u32 {
        self.firmware_metadata() + self.page_size
    }

    /// Bytes of release message that fit in the metadata page.
    pub const fn release_message_first_page(&self) -> u32 {
        self.page_size - METADATA_HEADER_LEN
    }

    /// Bytes of release message that fit across both pages.
    pub const fn release_message_capacity(&self) -> u32 {
        2 * self.page_size - METADATA_HEADER_LEN
    }

    pub const fn firmware_storage(&self) -> u32 {
        self.firmware_metadata() + 2 * self.page_size
    }

    pub const fn firmware_capacity(&self) -> u32 {
        self.firmware_pages * self.page_size
    }

    // --- Configuration record ---

    pub const fn config_metadata(&self) -> u32 {
        self.firmware_storage() + self.firmware_capacity()
    }

    pub const fn config_size(&self) -> u32 {
        self.config_metadata()
    }

    pub const fn config_storage(&self) -> u32 {
        self.config_metadata() + self.page_size
    }

    pub const fn config_capacity(&self) -> u32 {
        self.config_pages * self.page_size
    }

    /// First offset past the configuration storage.
    pub const fn end(&self) -> u32 {
        self.config_storage() + self.config_capacity()
    }

    /// Storage base and capacity of a readback region.
    pub const fn region(&self, region: Region) -> (u32, u32) {
        match region {
            Region::Firmware => (self.firmware_storage(), self.firmware_capacity()),
            Region::Configuration => (self.config_storage(), self.config_capacity()),
        }
    }
}
