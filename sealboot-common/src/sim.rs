// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! RAM-backed collaborators for running the bootloader on a host.
//!
//! - [`RamFlash`]: NOR flash with page erase, bit-clearing writes and an operation log
//! - [`ScriptedLink`]: serial link replaying a fixed host transcript
//! - [`RamLauncher`]: execution region whose jump panics instead of diverging
//! - [`channel_link`]: threaded link for driving a device from a real host client
//! - [`seal_payload`] / [`update_request`]: host-side encoding of update transactions

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use embedded_io::{ErrorKind, ErrorType, Read, Write};
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType as FlashErrorType, MultiwriteNorFlash, NorFlash,
    NorFlashErrorKind, ReadNorFlash,
};

use crate::handlers::boot::Launcher;
use crate::integrity::{padded_len, seal_in_place, Digest, Key, PAD_BYTE};

// --- Flash ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    Erase { from: u32, to: u32 },
    Write { offset: u32, len: usize },
}

/// Flash device with `PAGE`-byte erase sectors and word-sized writes.
pub struct RamFlash<const PAGE: usize> {
    data: Vec<u8>,
    ops: Vec<FlashOp>,
}

impl<const PAGE: usize> RamFlash<PAGE> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0xFF; capacity],
            ops: Vec::new(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw access, bypassing NOR semantics. Used to plant or corrupt contents.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Whether any erase or write touched `[from, to)`.
    pub fn touched(&self, from: u32, to: u32) -> bool {
        self.ops.iter().any(|op| {
            let (start, end) = match *op {
                FlashOp::Erase { from, to } => (from, to),
                FlashOp::Write { offset, len } => (offset, offset + len as u32),
            };
            start < to && from < end
        })
    }
}

impl<const PAGE: usize> FlashErrorType for RamFlash<PAGE> {
    type Error = NorFlashErrorKind;
}

impl<const PAGE: usize> ReadNorFlash for RamFlash<PAGE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl<const PAGE: usize> NorFlash for RamFlash<PAGE> {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = PAGE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.data[from as usize..to as usize].fill(0xFF);
        self.ops.push(FlashOp::Erase { from, to });
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        let start = offset as usize;
        for (cell, &byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        self.ops.push(FlashOp::Write {
            offset,
            len: bytes.len(),
        });
        Ok(())
    }
}

impl<const PAGE: usize> MultiwriteNorFlash for RamFlash<PAGE> {}

// --- Serial ---

/// Link that feeds a pre-recorded host transcript and records every byte sent back.
/// Reading past the transcript reports end-of-stream.
#[derive(Default)]
pub struct ScriptedLink {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl ScriptedLink {
    pub fn new(input: &[u8]) -> Self {
        Self {
            rx: input.iter().copied().collect(),
            tx: Vec::new(),
        }
    }

    pub fn push(&mut self, input: &[u8]) {
        self.rx.extend(input.iter().copied());
    }

    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }

    pub fn remaining(&self) -> usize {
        self.rx.len()
    }
}

impl ErrorType for ScriptedLink {
    type Error = core::convert::Infallible;
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Device side of a [`channel_link`].
pub struct DeviceEnd {
    rx: Receiver<u8>,
    tx: Sender<u8>,
}

/// Host side of a [`channel_link`], speaking `std::io`.
pub struct HostEnd {
    rx: Receiver<u8>,
    tx: Sender<u8>,
}

/// The peer hung up.
#[derive(Debug, Clone, Copy)]
pub struct Hangup;

impl embedded_io::Error for Hangup {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A connected pair of link ends for running the device loop on its own thread.
/// Dropping one end makes reads on the other report end-of-stream.
pub fn channel_link() -> (DeviceEnd, HostEnd) {
    let (to_device, device_rx) = mpsc::channel();
    let (to_host, host_rx) = mpsc::channel();
    (
        DeviceEnd {
            rx: device_rx,
            tx: to_host,
        },
        HostEnd {
            rx: host_rx,
            tx: to_device,
        },
    )
}

/// Block for the first byte, then drain whatever else is already queued.
fn recv_into(rx: &Receiver<u8>, buf: &mut [u8]) -> usize {
    if buf.is_empty() {
        return 0;
    }
    let Ok(first) = rx.recv() else {
        return 0;
    };
    buf[0] = first;

    let mut n = 1;
    while n < buf.len() {
        match rx.try_recv() {
            Ok(byte) => {
                buf[n] = byte;
                n += 1;
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
    n
}

impl ErrorType for DeviceEnd {
    type Error = Hangup;
}

impl Read for DeviceEnd {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(recv_into(&self.rx, buf))
    }
}

impl Write for DeviceEnd {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for &byte in buf {
            self.tx.send(byte).map_err(|_| Hangup)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl io::Read for HostEnd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(recv_into(&self.rx, buf))
    }
}

impl io::Write for HostEnd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.tx
                .send(byte)
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// --- Execution ---

/// Execution RAM backed by a host buffer. Launching panics with the entry point,
/// so tests observe the hand-over with `#[should_panic]` or `catch_unwind`.
pub struct RamLauncher {
    base: u32,
    region: Vec<u8>,
}

impl RamLauncher {
    pub fn new(base: u32, capacity: usize) -> Self {
        Self {
            base,
            region: vec![0; capacity],
        }
    }

    pub fn region(&self) -> &[u8] {
        &self.region
    }
}

impl Launcher for RamLauncher {
    fn exec_region(&mut self) -> &mut [u8] {
        &mut self.region
    }

    fn launch(&mut self) -> ! {
        panic!("launch: jumping to entry {:#010x}", self.base | 1);
    }
}

// --- Host-side encoding ---

/// Pad `plain` with `0xFF` to whole cipher blocks, hash it and encrypt it the
/// way the provisioning tool does. Returns the ciphertext and plaintext digest.
pub fn seal_payload(plain: &[u8], key: &Key) -> (Vec<u8>, Digest) {
    let mut buf = plain.to_vec();
    buf.resize(padded_len(plain.len()), PAD_BYTE);
    let digest = seal_in_place(&mut buf, key);
    (buf, digest)
}

/// Bytes a host sends for an update after the command byte: header lines
/// followed by the payload.
pub fn update_request(version: u16, message: &[u8], digest: &Digest, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(message);
    out.push(b'\n');
    for byte in digest {
        out.extend_from_slice(format!("{byte:02x}").as_bytes());
    }
    out.push(b'\n');
    out.extend_from_slice(payload);
    out
}
