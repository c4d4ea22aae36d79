// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Wire constants for bootloader <-> host communication.
//!
//! The protocol is a raw byte stream initiated by the host. Every command is a
//! single ASCII byte which the device echoes back as acknowledgment. Multi-byte
//! integers are big-endian on the wire; lines are terminated by `\n`.

// --- Status bytes ---

/// Frame (or transaction step) accepted.
pub const FRAME_OK: u8 = 0x00;
/// Frame (or transaction step) rejected.
pub const FRAME_BAD: u8 = 0x01;

/// Sent by the boot handler once the image has been staged, before the release message.
pub const BOOT_MESSAGE_MARKER: u8 = b'M';

/// Terminator for host-delimited lines.
pub const LINE_DELIMITER: u8 = b'\n';

/// Terminator of a release message, on flash and on the wire.
pub const MESSAGE_TERMINATOR: u8 = 0x00;

// --- Size limits ---

/// Maximum release message length, excluding the terminator.
pub const MAX_RELEASE_MESSAGE_LEN: usize = 1024;

/// Release message buffer: message plus terminator.
pub const RELEASE_MESSAGE_BUF: usize = MAX_RELEASE_MESSAGE_LEN + 1;

/// Length of the hex-encoded digest line.
pub const DIGEST_HEX_LEN: usize = 64;

/// Bytes of metadata (size, version) preceding the release message in its page.
pub const METADATA_HEADER_LEN: u32 = 8;

/// Command byte sent by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Store a configuration blob.
    Configure,
    /// Install a new firmware image.
    Update,
    /// Dump a flash region back to the host.
    Readback,
    /// Stage the stored firmware and jump to it.
    Boot,
}

impl Command {
    /// Byte identifying the command on the wire, also used as its acknowledgment.
    pub const fn byte(self) -> u8 {
        match self {
            Self::Configure => b'C',
            Self::Update => b'U',
            Self::Readback => b'R',
            Self::Boot => b'B',
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'C' => Ok(Self::Configure),
            b'U' => Ok(Self::Update),
            b'R' => Ok(Self::Readback),
            b'B' => Ok(Self::Boot),
            other => Err(other),
        }
    }
}

/// Flash region selectable by the readback command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    Firmware,
    Configuration,
}

impl Region {
    /// Selector byte on the wire, echoed back by the device.
    pub const fn byte(self) -> u8 {
        match self {
            Self::Firmware => b'F',
            Self::Configuration => b'C',
        }
    }
}

impl TryFrom<u8> for Region {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'F' => Ok(Self::Firmware),
            b'C' => Ok(Self::Configuration),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_match_wire_values() {
        for cmd in [
            Command::Configure,
            Command::Update,
            Command::Readback,
            Command::Boot,
        ] {
            assert_eq!(Command::try_from(cmd.byte()), Ok(cmd));
        }
        assert_eq!(Command::try_from(b'X'), Err(b'X'));
        assert_eq!(Command::try_from(b'u'), Err(b'u'));
    }

    #[test]
    fn region_selector_rejects_unknown_bytes() {
        assert_eq!(Region::try_from(b'F'), Ok(Region::Firmware));
        assert_eq!(Region::try_from(b'C'), Ok(Region::Configuration));
        assert_eq!(Region::try_from(0), Err(0));
    }
}
