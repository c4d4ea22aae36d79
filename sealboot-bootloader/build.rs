// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let linker_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap())
        .parent()
        .unwrap()
        .join("linker_scripts");

    let linker_script = fs::read_to_string(linker_dir.join("bootloader_rp2040.x"))
        .expect("Failed to read bootloader_rp2040.x");
    fs::write(out_dir.join("memory.x"), linker_script).expect("Failed to write memory.x");

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rustc-link-arg=--nmagic");
    println!("cargo:rustc-link-arg=-Tlink.x");
    println!("cargo:rustc-link-arg=-Tdefmt.x");
    println!(
        "cargo:rerun-if-changed={}",
        linker_dir.join("bootloader_rp2040.x").display()
    );
    println!("cargo:rerun-if-changed=build.rs");

    // Device secrets are baked in at build time.
    println!("cargo:rerun-if-env-changed=SEALBOOT_KEY");
    println!("cargo:rerun-if-env-changed=SEALBOOT_OLDEST_VERSION");

    let key = match env::var("SEALBOOT_KEY") {
        Ok(text) => {
            let mut key = [0u8; 16];
            hex::decode_to_slice(text.trim(), &mut key)
                .expect("SEALBOOT_KEY must be 32 hex characters");
            key
        }
        Err(_) => {
            println!("cargo:warning=SEALBOOT_KEY not set, building with the development key");
            sealboot_common::DEVELOPMENT_KEY
        }
    };

    let oldest_version: u32 = match env::var("SEALBOOT_OLDEST_VERSION") {
        Ok(text) => text
            .trim()
            .parse()
            .expect("SEALBOOT_OLDEST_VERSION must be an unsigned integer"),
        Err(_) => 0,
    };

    let provisioning = format!(
        "pub const FIRMWARE_KEY: [u8; 16] = {key:?};\npub const OLDEST_VERSION: u32 = {oldest_version};\n"
    );
    fs::write(out_dir.join("provisioning.rs"), provisioning)
        .expect("Failed to write provisioning.rs");
}
