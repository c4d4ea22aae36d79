// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Blocking byte-level access to the host.
//!
//! There is no timeout anywhere: a host that stops sending mid-transaction
//! stalls the caller until the stream reports end-of-file or the device is
//! reset.

use embedded_io::{Read, ReadExactError, Write};
use heapless::Vec;

use crate::error::{link_error, Error};
use crate::protocol::LINE_DELIMITER;

/// Result of reading one delimited line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineStatus {
    Complete,
    /// The line did not fit; it was consumed up to its delimiter and the buffer holds its prefix.
    Overflow,
}

pub struct HostLink<T> {
    io: T,
}

impl<T> HostLink<T> {
    pub fn new(io: T) -> Self {
        Self { io }
    }

    pub fn get_ref(&self) -> &T {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.io
    }

    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: Read + Write> HostLink<T> {
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.io.read_exact(buf).map_err(|e| match e {
            ReadExactError::UnexpectedEof => Error::Disconnected,
            ReadExactError::Other(e) => link_error(e),
        })
    }

    pub fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, Error> {
        let mut raw = [0u8; 2];
        self.read_exact(&mut raw)?;
        Ok(u16::from_be_bytes(raw))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, Error> {
        let mut raw = [0u8; 4];
        self.read_exact(&mut raw)?;
        Ok(u32::from_be_bytes(raw))
    }

    /// Read bytes up to the line delimiter into `line`, dropping the delimiter
    /// and a trailing `\r`.
    pub fn read_line<const N: usize>(&mut self, line: &mut Vec<u8, N>) -> Result<LineStatus, Error> {
        line.clear();
        let mut status = LineStatus::Complete;
        // A `\r` is only stored once a byte other than the delimiter follows it.
        let mut pending_cr = false;

        loop {
            let byte = self.read_byte()?;
            if byte == LINE_DELIMITER {
                break;
            }
            if pending_cr && line.push(b'\r').is_err() {
                status = LineStatus::Overflow;
            }
            pending_cr = byte == b'\r';
            if !pending_cr && line.push(byte).is_err() {
                status = LineStatus::Overflow;
            }
        }

        Ok(status)
    }

    /// Write `data` and flush it out to the host.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        self.io.write_all(data).map_err(link_error)?;
        self.io.flush().map_err(link_error)
    }

    pub fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.send(&[byte])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedLink;

    #[test]
    fn integers_are_big_endian() {
        let mut link = HostLink::new(ScriptedLink::new(&[0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(link.read_u16_be(), Ok(0x1234));
        assert_eq!(link.read_u32_be(), Ok(0xDEAD_BEEF));
    }

    #[test]
    fn read_line_strips_delimiters() {
        let mut link = HostLink::new(ScriptedLink::new(b"v1.2 release\r\nnext\n"));
        let mut line: Vec<u8, 32> = Vec::new();

        assert_eq!(link.read_line(&mut line), Ok(LineStatus::Complete));
        assert_eq!(line.as_slice(), b"v1.2 release");
        assert_eq!(link.read_line(&mut line), Ok(LineStatus::Complete));
        assert_eq!(line.as_slice(), b"next");
    }

    #[test]
    fn crlf_does_not_count_against_capacity() {
        let mut link = HostLink::new(ScriptedLink::new(b"abcd\r\na\rb\n"));
        let mut line: Vec<u8, 4> = Vec::new();

        assert_eq!(link.read_line(&mut line), Ok(LineStatus::Complete));
        assert_eq!(line.as_slice(), b"abcd");
        assert_eq!(link.read_line(&mut line), Ok(LineStatus::Complete));
        assert_eq!(line.as_slice(), b"a\rb");
    }

    #[test]
    fn read_line_consumes_overlong_line() {
        let mut link = HostLink::new(ScriptedLink::new(b"abcdefgh\nZ"));
        let mut line: Vec<u8, 4> = Vec::new();

        assert_eq!(link.read_line(&mut line), Ok(LineStatus::Overflow));
        assert_eq!(line.as_slice(), b"abcd");
        assert_eq!(link.read_byte(), Ok(b'Z'));
    }

    #[test]
    fn exhausted_stream_reports_disconnect() {
        let mut link = HostLink::new(ScriptedLink::new(&[0x01]));
        assert_eq!(link.read_u32_be(), Err(Error::Disconnected));
    }
}
