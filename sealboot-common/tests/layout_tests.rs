// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Unit tests for the flash region map.

use sealboot_common::layout::{RegionMap, COMMIT_OFFSET};
use sealboot_common::protocol::Region;

const PAGE: u32 = 1024;
const MAP: RegionMap = RegionMap::new(0x0002_B000, PAGE, 16, 64);

#[test]
fn test_firmware_slots_follow_each_other() {
    assert_eq!(MAP.firmware_digest(), 0x0002_B000);
    assert_eq!(MAP.firmware_commit(), 0x0002_B000 + COMMIT_OFFSET);
    assert_eq!(MAP.firmware_metadata(), 0x0002_B400);
    assert_eq!(MAP.firmware_size(), 0x0002_B400);
    assert_eq!(MAP.firmware_version(), 0x0002_B404);
    assert_eq!(MAP.release_message(), 0x0002_B408);
    assert_eq!(MAP.release_message_spill(), 0x0002_B800);
    assert_eq!(MAP.firmware_storage(), 0x0002_BC00);
}

#[test]
fn test_release_message_area_is_contiguous() {
    assert_eq!(
        MAP.release_message() + MAP.release_message_first_page(),
        MAP.release_message_spill()
    );
    assert_eq!(MAP.release_message_capacity(), 2 * PAGE - 8);
}

#[test]
fn test_configuration_follows_firmware_storage() {
    assert_eq!(MAP.firmware_capacity(), 16 * 1024);
    assert_eq!(MAP.config_metadata(), 0x0002_FC00);
    assert_eq!(MAP.config_size(), 0x0002_FC00);
    assert_eq!(MAP.config_storage(), 0x0003_0000);
    assert_eq!(MAP.config_capacity(), 64 * 1024);
    assert_eq!(MAP.end(), 0x0004_0000);
}

#[test]
fn test_erased_and_programmed_slots_are_page_aligned() {
    assert!(MAP.is_page_aligned());
    for addr in [
        MAP.firmware_digest(),
        MAP.firmware_metadata(),
        MAP.release_message_spill(),
        MAP.firmware_storage(),
        MAP.config_metadata(),
        MAP.config_storage(),
    ] {
        assert_eq!(addr % PAGE, 0, "0x{addr:08x} is not page aligned");
    }
}

#[test]
fn test_unaligned_base_is_detected() {
    assert!(!RegionMap::new(0x100, PAGE, 1, 1).is_page_aligned());
    assert!(!RegionMap::new(0, 0, 1, 1).is_page_aligned());
}

#[test]
fn test_region_selector_maps_to_storage_base() {
    assert_eq!(MAP.region(Region::Firmware), (MAP.firmware_storage(), MAP.firmware_capacity()));
    assert_eq!(MAP.region(Region::Configuration), (MAP.config_storage(), MAP.config_capacity()));
}
