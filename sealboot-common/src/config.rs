// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Runtime policy handed to the dispatcher.

use crate::integrity::Key;

/// Key shipped with development builds. Production images inject their own.
pub const DEVELOPMENT_KEY: Key = [
    0x1a, 0x2a, 0x3a, 0x4a, 0x5a, 0x6a, 0x7a, 0x8a, 0x1a, 0x2a, 0x3a, 0x4a, 0x5a, 0x6a, 0x7a, 0x8a,
];

/// How far a readback request may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadbackPolicy {
    /// Requests larger than the selected region are dropped without a response.
    #[default]
    WithinRegion,
    /// Any size is served, reading past the region into adjacent flash.
    Unrestricted,
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Pre-shared AES-128 key protecting firmware payloads.
    pub key: Key,
    /// Version assumed when the stored version slot is erased.
    pub oldest_version: u32,
    pub readback: ReadbackPolicy,
}

impl Config {
    pub const fn new(key: Key) -> Self {
        Self {
            key,
            oldest_version: 0,
            readback: ReadbackPolicy::WithinRegion,
        }
    }

    pub const fn with_oldest_version(mut self, version: u32) -> Self {
        self.oldest_version = version;
        self
    }

    pub const fn with_readback(mut self, policy: ReadbackPolicy) -> Self {
        self.readback = policy;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEVELOPMENT_KEY)
    }
}
