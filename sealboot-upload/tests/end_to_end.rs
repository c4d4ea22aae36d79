// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The host client driving an in-process device over a channel link.

use std::thread::{self, JoinHandle};

use sealboot_common::sim::{channel_link, DeviceEnd, HostEnd, RamFlash, RamLauncher};
use sealboot_common::{Bootloader, Config, Region, RegionMap, Verification, DEVELOPMENT_KEY};
use sealboot_upload::client::{BootResult, UpdateResult};
use sealboot_upload::{Client, SealedFirmware};

const PAGE: usize = 256;
const MAP: RegionMap = RegionMap::new(0, PAGE as u32, 16, 4);
const EXEC_BASE: u32 = 0x2002_0000;

type Device = Bootloader<DeviceEnd, RamFlash<PAGE>, RamLauncher>;

/// Serve commands until the host hangs up, then hand the device back.
fn spawn_device() -> (Client<HostEnd>, JoinHandle<Device>) {
    let (device_end, host_end) = channel_link();
    let mut device = Bootloader::new(
        device_end,
        RamFlash::new(MAP.end() as usize),
        RamLauncher::new(EXEC_BASE, 8 * PAGE),
        MAP,
        Config::default(),
    )
    .unwrap();

    let handle = thread::spawn(move || {
        while device.serve().is_ok() {}
        device
    });
    (Client::new(host_end, PAGE), handle)
}

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn configure_then_read_back() {
    let (mut client, device) = spawn_device();

    assert!(client.configure(b"DEADBEEF", |_| {}).unwrap());
    assert_eq!(client.readback(Region::Configuration, 8).unwrap(), b"DEADBEEF");

    drop(client);
    device.join().unwrap();
}

#[test]
fn install_reject_rollback_and_boot() {
    let (mut client, device) = spawn_device();

    let plain = image(600);
    let v5 = SealedFirmware::seal(&plain, 5, "release five", &DEVELOPMENT_KEY).unwrap();
    let mut acked = Vec::new();
    let result = client.update(&v5, |sent| acked.push(sent)).unwrap();
    assert_eq!(result, UpdateResult::Installed(Verification::Verified));
    assert_eq!(acked, [256, 512, 608]);

    // Verification decrypts in place, so flash holds the padded plaintext.
    let stored = client.readback(Region::Firmware, 608).unwrap();
    assert_eq!(&stored[..600], &plain[..]);
    assert!(stored[600..].iter().all(|&b| b == 0xFF));

    let v3 = SealedFirmware::seal(&image(32), 3, "older", &DEVELOPMENT_KEY).unwrap();
    assert_eq!(client.update(&v3, |_| {}).unwrap(), UpdateResult::Rejected);

    assert_eq!(
        client.boot().unwrap(),
        BootResult::Launched("release five".into())
    );

    drop(client);
    // The simulated launcher panics where real hardware would jump.
    let Err(err) = device.join() else {
        panic!("device loop returned instead of launching");
    };
    let message = err.downcast_ref::<String>().unwrap();
    assert_eq!(message, "launch: jumping to entry 0x20020001");
}

#[test]
fn tampered_bundle_is_installed_unverified_and_never_booted() {
    let (mut client, device) = spawn_device();

    let mut sealed = SealedFirmware::seal(&image(64), 1, "tampered", &DEVELOPMENT_KEY).unwrap();
    sealed.payload[10] ^= 0x80;
    assert_eq!(
        client.update(&sealed, |_| {}).unwrap(),
        UpdateResult::Installed(Verification::Failed)
    );
    assert_eq!(client.boot().unwrap(), BootResult::Refused);

    drop(client);
    let device = device.join().unwrap();
    let (_, _, launcher) = device.into_parts();
    assert!(launcher.region().iter().all(|&b| b == 0));
}

#[test]
fn oversized_configuration_is_refused() {
    let (mut client, device) = spawn_device();

    let blob = vec![0xA5; MAP.config_capacity() as usize + 1];
    assert!(!client.configure(&blob, |_| {}).unwrap());

    drop(client);
    device.join().unwrap();
}
