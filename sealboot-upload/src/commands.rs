// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for bootloader operations.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use sealboot_common::{Region, Verification, DEVELOPMENT_KEY};
use sealboot_upload::bundle::{read_key_file, SealedFirmware};
use sealboot_upload::client::{BootResult, UpdateResult};
use sealboot_upload::Client;

fn progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Seal a plain image into a bundle.
pub fn protect(file: &Path, version: u16, message: &str, key_file: Option<&Path>, output: &Path) -> Result<()> {
    let image = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let key = match key_file {
        Some(path) => read_key_file(path)?,
        None => {
            println!("Warning: no key file given, sealing with the development key");
            DEVELOPMENT_KEY
        }
    };

    let sealed = SealedFirmware::seal(&image, version, message, &key)?;
    sealed.save(output)?;

    println!("Firmware: {} ({} bytes)", file.display(), image.len());
    println!("Version:  {}", version);
    println!("Payload:  {} bytes", sealed.payload.len());
    println!("SHA-256:  {}", sealed.digest_hex());
    println!("Bundle:   {}", output.display());
    Ok(())
}

/// Install a sealed bundle.
pub fn update<P: Read + Write>(client: &mut Client<P>, bundle: &Path) -> Result<()> {
    let firmware = SealedFirmware::load(bundle)?;
    println!(
        "Bundle:   {} (version {}, {} bytes)",
        bundle.display(),
        firmware.version,
        firmware.payload.len()
    );
    if !firmware.release_message.is_empty() {
        println!("Message:  {}", firmware.release_message);
    }
    println!();

    let pb = progress_bar(firmware.payload.len())?;
    let result = client.update(&firmware, |sent| pb.set_position(sent as u64));

    match result {
        Ok(UpdateResult::Rejected) => {
            pb.abandon();
            bail!("Update rejected (stale version, image too large or bad release message)")
        }
        Ok(UpdateResult::Installed(Verification::Verified)) => {
            pb.finish_with_message("Upload complete");
            println!();
            println!("Firmware installed and verified.");
            Ok(())
        }
        Ok(UpdateResult::Installed(Verification::Failed)) => {
            pb.abandon();
            bail!("Firmware written but failed verification; the device will refuse to boot it")
        }
        Err(e) => {
            pb.abandon();
            Err(e)
        }
    }
}

/// Store a configuration blob.
pub fn configure<P: Read + Write>(client: &mut Client<P>, file: &Path) -> Result<()> {
    let blob = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("Config:   {} ({} bytes)", file.display(), blob.len());

    let pb = progress_bar(blob.len())?;
    match client.configure(&blob, |sent| pb.set_position(sent as u64)) {
        Ok(true) => {
            pb.finish_with_message("Upload complete");
            println!("Configuration stored.");
            Ok(())
        }
        Ok(false) => {
            pb.abandon();
            bail!("Configuration rejected (larger than the configuration region)")
        }
        Err(e) => {
            pb.abandon();
            Err(e)
        }
    }
}

/// Dump a flash region to a file or stdout.
pub fn readback<P: Read + Write>(client: &mut Client<P>, region: Region, size: u32, output: Option<&Path>) -> Result<()> {
    let data = client.readback(region, size)?;

    match output {
        Some(path) => {
            fs::write(path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} bytes written to {}", data.len(), path.display());
        }
        None => print!("{}", hex_dump(&data)),
    }
    Ok(())
}

/// Boot the installed firmware.
pub fn boot<P: Read + Write>(client: &mut Client<P>) -> Result<()> {
    match client.boot()? {
        BootResult::Launched(message) => {
            println!("Booting firmware.");
            if !message.is_empty() {
                println!("Release message: {}", message);
            }
            Ok(())
        }
        BootResult::Refused => bail!("Device refused to boot: no verified firmware installed"),
    }
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        out.push_str(&format!("{:08x}  {}\n", i * 16, hex::encode(line)));
    }
    out
}
