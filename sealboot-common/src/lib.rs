// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Core of the sealboot serial bootloader.
//!
//! Everything here is independent of the board: the handlers talk to the host
//! through any `embedded_io` byte stream, persist records through any
//! `embedded_storage` NOR flash, and hand over to firmware through a
//! [`Launcher`].
//!
//! This crate supports both `no_std` (embedded) and `std` (host) environments:
//! - Default: `no_std` mode for embedded targets
//! - `std` feature: Enables `std` support for host tools
//! - `sim` feature: RAM-backed collaborators for host-side tests (implies `std`)
//! - `defmt` feature: Enables defmt logging and `defmt::Format` on public types

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod integrity;
pub mod layout;
pub mod link;
pub mod loader;
pub mod protocol;
pub mod record;
pub mod storage;

// RAM-backed collaborators for host-side testing
#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export commonly used types
pub use config::{Config, ReadbackPolicy, DEVELOPMENT_KEY};
pub use dispatch::{Bootloader, Served};
pub use error::{Error, FlashFault};
pub use handlers::boot::Launcher;
pub use integrity::{Digest, Key, Verification};
pub use layout::RegionMap;
pub use protocol::{Command, Region, FRAME_BAD, FRAME_OK};
