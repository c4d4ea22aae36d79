// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Blocking byte stream over USB CDC.
//!
//! The bootloader core reads and writes through `embedded_io`; every call here
//! keeps polling the USB device until the request can be satisfied.

use embedded_io::{ErrorKind, ErrorType, Read, Write};
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

#[derive(Debug, defmt::Format)]
pub enum TransportError {
    StringTooLong,
    Usb,
}

impl embedded_io::Error for TransportError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct UsbTransport {
    serial: SerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
}

impl UsbTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Result<Self, TransportError> {
        let serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Sealboot Bootloader")
                .serial_number("0001")])
            .map_err(|_| TransportError::StringTooLong)?
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Ok(Self { serial, usb_dev })
    }

    /// Poll USB device. Must be called frequently.
    pub fn poll(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }
}

impl ErrorType for UsbTransport {
    type Error = TransportError;
}

impl Read for UsbTransport {
    /// Blocks until at least one byte has arrived.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.poll();
            match self.serial.read(buf) {
                Ok(0) | Err(UsbError::WouldBlock) => continue,
                Ok(n) => return Ok(n),
                Err(_) => return Err(TransportError::Usb),
            }
        }
    }
}

impl Write for UsbTransport {
    /// Blocks until at least one byte has been queued.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.serial.write(buf) {
                Ok(0) | Err(UsbError::WouldBlock) => {
                    self.poll();
                }
                Ok(n) => return Ok(n),
                Err(_) => return Err(TransportError::Usb),
            }
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        loop {
            match self.serial.flush() {
                Ok(()) => return Ok(()),
                Err(UsbError::WouldBlock) => {
                    self.poll();
                }
                Err(_) => return Err(TransportError::Usb),
            }
        }
    }
}
