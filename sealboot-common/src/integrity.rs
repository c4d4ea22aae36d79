// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware integrity pipeline.
//!
//! Payloads travel and land in flash encrypted with AES-128-CBC under a
//! pre-shared key and an all-zero IV. After the last frame is programmed the
//! payload is decrypted in place, hashed with SHA-256 and compared against the
//! digest the host declared in the update header.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::Aes128;
use embedded_storage::nor_flash::MultiwriteNorFlash;
use sha2::{Digest as _, Sha256};

use crate::error::Error;
use crate::record;
use crate::storage::{erased_page, Storage};

/// Block size the pipeline is written for.
pub const CIPHER_BLOCK_SIZE: usize = 16;

pub const DIGEST_LEN: usize = 32;

pub type Key = [u8; 16];
pub type Digest = [u8; DIGEST_LEN];

/// Outcome of checking a payload against its declared digest.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verification {
    Verified,
    Failed,
}

impl Verification {
    pub fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Streaming CBC decryption with a zero IV.
///
/// A cipher whose block size is not [`CIPHER_BLOCK_SIZE`] turns every call into
/// a no-op; the untouched ciphertext then fails the digest comparison.
pub struct PayloadDecryptor<C>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    cbc: Option<cbc::Decryptor<C>>,
}

impl<C> PayloadDecryptor<C>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    pub fn new(key: &[u8]) -> Self {
        if C::block_size() != CIPHER_BLOCK_SIZE {
            #[cfg(feature = "defmt")]
            defmt::warn!("Cipher block size {} unsupported, skipping decryption", C::block_size());
            return Self { cbc: None };
        }

        let iv = [0u8; CIPHER_BLOCK_SIZE];
        Self {
            cbc: cbc::Decryptor::<C>::new_from_slices(key, &iv).ok(),
        }
    }

    /// Decrypt whole blocks of `data` in place, chaining from the previous call.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        let Some(cbc) = self.cbc.as_mut() else {
            return;
        };
        for block in data.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
            cbc.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

/// Fills the last cipher block of a plaintext image before sealing.
pub const PAD_BYTE: u8 = 0xFF;

/// Length of a `len`-byte image padded to whole cipher blocks.
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(CIPHER_BLOCK_SIZE) * CIPHER_BLOCK_SIZE
}

/// Host-side counterpart of the pipeline: hash the padded plaintext, then
/// encrypt it in place. Returns the digest the device will check against.
pub fn seal_in_place(payload: &mut [u8], key: &Key) -> Digest {
    let digest = sha256(payload);
    let iv = [0u8; CIPHER_BLOCK_SIZE];
    let mut cipher = cbc::Encryptor::<Aes128>::new(key.into(), &iv.into());
    for block in payload.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    digest
}

/// Byte-wise comparison without early exit.
pub fn digests_match(a: &Digest, b: &Digest) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn sha256(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

fn check_length(len: usize) -> bool {
    if len % CIPHER_BLOCK_SIZE != 0 {
        #[cfg(feature = "defmt")]
        defmt::warn!("Payload size {} is not a whole number of cipher blocks", len);
        return false;
    }
    true
}

/// Decrypt `payload` in place and compare its SHA-256 against `expected`.
pub fn decrypt_and_verify(payload: &mut [u8], key: &Key, expected: &Digest) -> Verification {
    decrypt_and_verify_with::<Aes128>(payload, key, expected)
}

/// [`decrypt_and_verify`] over an arbitrary block cipher.
pub fn decrypt_and_verify_with<C>(payload: &mut [u8], key: &[u8], expected: &Digest) -> Verification
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    if !check_length(payload.len()) {
        return Verification::Failed;
    }

    PayloadDecryptor::<C>::new(key).decrypt(payload);
    if digests_match(&sha256(payload), expected) {
        Verification::Verified
    } else {
        Verification::Failed
    }
}

/// Run the pipeline over the firmware record resident in flash: every payload
/// page is decrypted and programmed back as plaintext, then the plaintext
/// digest is compared with the digest slot.
pub fn decrypt_and_verify_stored<F: MultiwriteNorFlash>(
    storage: &mut Storage<F>,
    key: &Key,
) -> Result<Verification, Error> {
    let map = *storage.map();
    let size = storage.read_u32(map.firmware_size())?;
    let expected = record::read_digest(storage)?;

    if size > map.firmware_capacity() || !check_length(size as usize) {
        return Ok(Verification::Failed);
    }

    let page_size = storage.page_size();
    let mut decryptor = PayloadDecryptor::<Aes128>::new(key);
    let mut hasher = Sha256::new();
    let mut page = erased_page();
    let mut addr = map.firmware_storage();
    let mut remaining = size as usize;

    while remaining > 0 {
        let frame = remaining.min(page_size);
        let page = &mut page[..page_size];
        storage.read(addr, page)?;
        decryptor.decrypt(&mut page[..frame]);
        hasher.update(&page[..frame]);
        storage.write_page(addr, page)?;

        addr += page_size as u32;
        remaining -= frame;
    }

    let actual: Digest = hasher.finalize().into();
    Ok(if digests_match(&actual, &expected) {
        Verification::Verified
    } else {
        #[cfg(feature = "defmt")]
        defmt::warn!("Firmware digest mismatch");
        Verification::Failed
    })
}

/// SHA-256 of the first `size` bytes of firmware storage, read page by page.
pub fn digest_stored_payload<F: MultiwriteNorFlash>(storage: &mut Storage<F>, size: u32) -> Result<Digest, Error> {
    let map = *storage.map();
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 256];
    let mut addr = map.firmware_storage();
    let mut remaining = size as usize;

    while remaining > 0 {
        let n = remaining.min(chunk.len());
        storage.read(addr, &mut chunk[..n])?;
        hasher.update(&chunk[..n]);
        addr += n as u32;
        remaining -= n;
    }

    Ok(hasher.finalize().into())
}
