// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command handlers. Each runs one transaction to completion.

pub mod boot;
pub mod configure;
pub mod readback;
pub mod update;

pub use boot::{BootRefusal, Launcher};
pub use configure::ConfigureOutcome;
pub use readback::ReadbackOutcome;
pub use update::UpdateOutcome;

/// Why a transaction was turned down before any flash was modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// Candidate firmware is older than the installed one.
    StaleVersion { candidate: u32, current: u32 },
    /// Declared size exceeds the destination region.
    TooLarge { size: u32, capacity: u32 },
    /// Release message does not fit the message area.
    MessageTooLong,
    /// Digest line is not 64 hex characters.
    MalformedDigest,
}
