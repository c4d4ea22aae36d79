// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Sealed firmware bundles.
//!
//! A bundle is the postcard encoding of [`SealedFirmware`] followed by a
//! little-endian CRC-32 of the encoded bytes.

use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};

use sealboot_common::integrity::{padded_len, seal_in_place, PAD_BYTE};
use sealboot_common::protocol::MAX_RELEASE_MESSAGE_LEN;
use sealboot_common::{Digest, Key};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const TRAILER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFirmware {
    pub version: u16,
    pub release_message: String,
    /// SHA-256 of the padded plaintext.
    pub digest: Digest,
    /// AES-128-CBC ciphertext, zero IV.
    pub payload: Vec<u8>,
}

impl SealedFirmware {
    /// Pad, hash and encrypt a plaintext image.
    pub fn seal(image: &[u8], version: u16, release_message: &str, key: &Key) -> Result<Self> {
        ensure!(
            release_message.len() <= MAX_RELEASE_MESSAGE_LEN,
            "release message is {} bytes, at most {} allowed",
            release_message.len(),
            MAX_RELEASE_MESSAGE_LEN
        );
        ensure!(
            !release_message.contains(['\n', '\0']),
            "release message must be a single line"
        );

        let mut payload = image.to_vec();
        payload.resize(padded_len(image.len()), PAD_BYTE);
        let digest = seal_in_place(&mut payload, key);

        Ok(Self {
            version,
            release_message: release_message.to_owned(),
            digest,
            payload,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = postcard::to_stdvec(self).context("Failed to encode bundle")?;
        let crc = CRC32.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_le_bytes());
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TRAILER_LEN {
            bail!("bundle is truncated ({} bytes)", bytes.len());
        }
        let (body, trailer) = bytes.split_at(bytes.len() - TRAILER_LEN);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = CRC32.checksum(body);
        if actual != expected {
            bail!("bundle CRC mismatch: stored 0x{expected:08x}, computed 0x{actual:08x}");
        }
        postcard::from_bytes(body).context("Malformed bundle")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.encode()?).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::decode(&bytes).with_context(|| format!("Invalid bundle {}", path.display()))
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Parse an AES-128 key written as 32 hex characters.
pub fn parse_key(text: &str) -> Result<Key> {
    let mut key = Key::default();
    hex::decode_to_slice(text.trim(), &mut key).context("key must be 32 hex characters")?;
    Ok(key)
}

pub fn read_key_file(path: &Path) -> Result<Key> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_key(&text).with_context(|| format!("Invalid key file {}", path.display()))
}
