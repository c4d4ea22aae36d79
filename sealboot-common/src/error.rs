// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Errors raised by the collaborators underneath the handlers.
//!
//! Protocol rejections (stale version, oversized transfer, malformed line) are
//! not errors: they are reported to the host and returned as outcomes.

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The serial driver reported a fault.
    Link,
    /// The host closed the stream in the middle of a transaction.
    Disconnected,
    /// The flash driver rejected an operation.
    Flash(FlashFault),
    /// The region map does not fit the flash device's erase/write granularity.
    Geometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFault {
    NotAligned,
    OutOfBounds,
    Other,
}

impl From<NorFlashErrorKind> for FlashFault {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Other,
        }
    }
}

pub(crate) fn flash_error<E: NorFlashError>(err: E) -> Error {
    Error::Flash(err.kind().into())
}

pub(crate) fn link_error<E: embedded_io::Error>(_err: E) -> Error {
    Error::Link
}
