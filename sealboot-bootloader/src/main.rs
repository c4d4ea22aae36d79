// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

#![no_std]
#![no_main]

mod boot;
mod flash;
mod usb_transport;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;
use rp2040_hal as hal;
use sealboot_common::{Bootloader, Config, ReadbackPolicy, RegionMap};
use static_cell::StaticCell;
use usb_device::class_prelude::UsbBusAllocator;

mod provisioning {
    include!(concat!(env!("OUT_DIR"), "/provisioning.rs"));
}

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const XTAL_FREQ_HZ: u32 = 12_000_000;

/// Everything below this flash offset belongs to the bootloader.
const FIRMWARE_BASE: u32 = 0x0001_0000;

/// 128K of firmware pages, then 64K of configuration pages.
const REGION_MAP: RegionMap = RegionMap::new(FIRMWARE_BASE, flash::FLASH_SECTOR_SIZE, 32, 16);

const READBACK: ReadbackPolicy = if cfg!(feature = "unrestricted-readback") {
    ReadbackPolicy::Unrestricted
} else {
    ReadbackPolicy::WithinRegion
};

static USB_BUS: StaticCell<UsbBusAllocator<hal::usb::UsbBus>> = StaticCell::new();

#[entry]
fn main() -> ! {
    defmt::println!("Bootloader init");

    let Some(mut pac) = hal::pac::Peripherals::take() else {
        defmt::panic!("Peripherals already taken");
    };
    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let Ok(clocks) = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    ) else {
        defmt::panic!("Clock init failed");
    };

    flash::init();

    let usb_bus = USB_BUS.init(UsbBusAllocator::new(hal::usb::UsbBus::new(
        pac.USBCTRL_REGS,
        pac.USBCTRL_DPRAM,
        clocks.usb_clock,
        true,
        &mut pac.RESETS,
    )));
    let transport = match usb_transport::UsbTransport::new(usb_bus) {
        Ok(transport) => transport,
        Err(e) => defmt::panic!("USB init failed: {:?}", e),
    };
    defmt::println!("USB CDC initialized");

    let config = Config::new(provisioning::FIRMWARE_KEY)
        .with_oldest_version(provisioning::OLDEST_VERSION)
        .with_readback(READBACK);

    // SAFETY: the linker script keeps bootloader RAM below boot::EXEC_BASE.
    let launcher = unsafe { boot::RamLauncher::new() };

    let mut bootloader = match Bootloader::new(
        transport,
        flash::RomFlash::new(FIRMWARE_BASE),
        launcher,
        REGION_MAP,
        config,
    ) {
        Ok(bootloader) => bootloader,
        Err(e) => defmt::panic!("Flash geometry rejected: {:?}", e),
    };

    defmt::println!(
        "Waiting for commands, firmware region at 0x{:08x}",
        flash::FLASH_BASE + FIRMWARE_BASE
    );
    bootloader.run()
}
