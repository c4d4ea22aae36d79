// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial port transport.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serialport::{SerialPort, SerialPortType};

pub const BAUD_RATE: u32 = 115_200;
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// USB vendor ID the bootloader enumerates with.
const BOOTLOADER_VID: u16 = 0x2E8A;

pub struct Transport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl Transport {
    pub fn new(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, BAUD_RATE)
            .timeout(TIMEOUT)
            .open()
            .with_context(|| format!("Failed to open serial port {port_name}"))?;
        Ok(Self {
            port,
            name: port_name.to_owned(),
        })
    }

    /// Open the first USB serial port with the bootloader's vendor ID.
    pub fn discover() -> Result<Self> {
        let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
        let found = ports.into_iter().find(|p| match &p.port_type {
            SerialPortType::UsbPort(info) => info.vid == BOOTLOADER_VID,
            _ => false,
        });
        match found {
            Some(info) => Self::new(&info.port_name),
            None => bail!("No bootloader found; pass --port explicitly"),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.name
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
