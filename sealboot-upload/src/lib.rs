// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host side of the sealboot serial protocol.
//!
//! - [`bundle`]: sealed firmware bundles (encrypt, hash, serialize)
//! - [`client`]: the protocol client, generic over any `Read + Write` stream
//! - [`transport`]: serial port discovery and setup

pub mod bundle;
pub mod client;
pub mod transport;

pub use bundle::SealedFirmware;
pub use client::Client;
pub use transport::Transport;
