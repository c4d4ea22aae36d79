// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Protocol client.
//!
//! Every transaction starts with a command byte that the device echoes back.
//! Bulk data is sent one flash page at a time; the device acknowledges each
//! programmed page with [`FRAME_OK`].

use std::io::{Read, Write};

use anyhow::{bail, Context, Result};

use sealboot_common::protocol::{BOOT_MESSAGE_MARKER, LINE_DELIMITER, MESSAGE_TERMINATOR};
use sealboot_common::{Command, Region, Verification, FRAME_BAD, FRAME_OK};

use crate::bundle::SealedFirmware;

/// Logical flash page of the RP2040 build.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Outcome of an update transaction the device accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// Header refused: stale version, oversized image or malformed line.
    Rejected,
    Installed(Verification),
}

/// How the device answered a boot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootResult {
    /// The device is jumping to the firmware. Holds its release message.
    Launched(String),
    Refused,
}

pub struct Client<P> {
    port: P,
    page_size: usize,
}

impl<P: Read + Write> Client<P> {
    pub fn new(port: P, page_size: usize) -> Self {
        Self { port, page_size }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).context("Failed to write to device")?;
        self.port.flush().context("Failed to flush to device")
    }

    fn recv_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.port
            .read_exact(&mut byte)
            .context("No response from device")?;
        Ok(byte[0])
    }

    fn expect_byte(&mut self, expected: u8, what: &str) -> Result<()> {
        let got = self.recv_byte()?;
        if got != expected {
            bail!("Unexpected {what}: expected 0x{expected:02x}, got 0x{got:02x}");
        }
        Ok(())
    }

    fn start(&mut self, command: Command) -> Result<()> {
        self.send(&[command.byte()])?;
        self.expect_byte(command.byte(), "command acknowledgment")
    }

    /// Stream `data` page by page, waiting for the acknowledgment of each.
    fn send_frames(&mut self, data: &[u8], mut progress: impl FnMut(usize)) -> Result<()> {
        let mut sent = 0;
        for frame in data.chunks(self.page_size) {
            self.send(frame)?;
            self.expect_byte(FRAME_OK, "frame acknowledgment")
                .with_context(|| format!("Frame at offset {sent} not accepted"))?;
            sent += frame.len();
            progress(sent);
        }
        Ok(())
    }

    pub fn configure(&mut self, blob: &[u8], progress: impl FnMut(usize)) -> Result<bool> {
        self.start(Command::Configure)?;
        self.send(&(blob.len() as u32).to_be_bytes())?;
        match self.recv_byte()? {
            FRAME_OK => {}
            FRAME_BAD => return Ok(false),
            other => bail!("Unexpected configure status 0x{other:02x}"),
        }
        self.send_frames(blob, progress)?;
        Ok(true)
    }

    pub fn update(&mut self, firmware: &SealedFirmware, progress: impl FnMut(usize)) -> Result<UpdateResult> {
        self.start(Command::Update)?;

        let mut header = Vec::with_capacity(8 + firmware.release_message.len() + 66);
        header.extend_from_slice(&firmware.version.to_be_bytes());
        header.extend_from_slice(&(firmware.payload.len() as u32).to_be_bytes());
        header.extend_from_slice(firmware.release_message.as_bytes());
        header.push(LINE_DELIMITER);
        header.extend_from_slice(firmware.digest_hex().as_bytes());
        header.push(LINE_DELIMITER);
        self.send(&header)?;

        match self.recv_byte()? {
            FRAME_OK => {}
            FRAME_BAD => return Ok(UpdateResult::Rejected),
            other => bail!("Unexpected update status 0x{other:02x}"),
        }

        self.send_frames(&firmware.payload, progress)?;

        let verification = match self.recv_byte().context("No verification status")? {
            FRAME_OK => Verification::Verified,
            FRAME_BAD => Verification::Failed,
            other => bail!("Unexpected verification status 0x{other:02x}"),
        };
        Ok(UpdateResult::Installed(verification))
    }

    /// Read `size` raw bytes from the start of a region. A device enforcing
    /// region bounds answers an oversized request with silence.
    pub fn readback(&mut self, region: Region, size: u32) -> Result<Vec<u8>> {
        self.start(Command::Readback)?;
        self.send(&[region.byte()])?;
        self.expect_byte(region.byte(), "region echo")?;
        self.send(&size.to_be_bytes())?;

        let mut data = vec![0u8; size as usize];
        self.port
            .read_exact(&mut data)
            .context("Readback incomplete (request larger than the region?)")?;
        Ok(data)
    }

    pub fn boot(&mut self) -> Result<BootResult> {
        self.start(Command::Boot)?;
        match self.recv_byte()? {
            BOOT_MESSAGE_MARKER => {}
            FRAME_BAD => return Ok(BootResult::Refused),
            other => bail!("Unexpected boot status 0x{other:02x}"),
        }

        let mut message = Vec::new();
        loop {
            let byte = self.recv_byte().context("Release message not terminated")?;
            if byte == MESSAGE_TERMINATOR {
                break;
            }
            message.push(byte);
        }
        Ok(BootResult::Launched(String::from_utf8_lossy(&message).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Replays canned device output and records what the client sent.
    struct Replay {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Replay {
        fn new(device_output: &[u8]) -> Self {
            Self {
                input: Cursor::new(device_output.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Replay {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Replay {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn configure_sends_size_then_frames() {
        let mut client = Client::new(Replay::new(&[b'C', FRAME_OK, FRAME_OK, FRAME_OK]), 4);
        let mut acked = Vec::new();
        assert!(client.configure(b"DEADBEEF", |n| acked.push(n)).unwrap());
        assert_eq!(acked, [4, 8]);

        let sent = client.into_inner().output;
        assert_eq!(sent, b"C\x00\x00\x00\x08DEADBEEF");
    }

    #[test]
    fn rejected_update_stops_after_header() {
        let firmware = SealedFirmware {
            version: 3,
            release_message: "old".into(),
            digest: [0xAB; 32],
            payload: vec![0; 16],
        };
        let mut client = Client::new(Replay::new(&[b'U', FRAME_BAD]), 256);
        assert_eq!(client.update(&firmware, |_| {}).unwrap(), UpdateResult::Rejected);

        let sent = client.into_inner().output;
        let mut expected = b"U\x00\x03\x00\x00\x00\x10old\n".to_vec();
        expected.extend_from_slice("ab".repeat(32).as_bytes());
        expected.push(b'\n');
        assert_eq!(sent, expected);
    }

    #[test]
    fn boot_collects_release_message() {
        let mut client = Client::new(Replay::new(b"BMv1.2 ready\0"), 256);
        assert_eq!(client.boot().unwrap(), BootResult::Launched("v1.2 ready".into()));

        let mut client = Client::new(Replay::new(&[b'B', FRAME_BAD]), 256);
        assert_eq!(client.boot().unwrap(), BootResult::Refused);
    }

    #[test]
    fn wrong_echo_is_an_error() {
        let mut client = Client::new(Replay::new(b"X"), 256);
        assert!(client.boot().is_err());
    }
}
