// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Execution window in SRAM and the jump into it.

use sealboot_common::Launcher;

/// Start of the execution window. The bootloader's own RAM ends here (see the linker script).
pub const EXEC_BASE: u32 = 0x2002_0000;
pub const EXEC_SIZE: usize = 128 * 1024;

pub struct RamLauncher {
    _private: (),
}

impl RamLauncher {
    /// # Safety
    /// `EXEC_BASE..EXEC_BASE + EXEC_SIZE` must be RAM the bootloader itself
    /// never uses, and only one launcher may exist.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Launcher for RamLauncher {
    fn exec_region(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(EXEC_BASE as *mut u8, EXEC_SIZE) }
    }

    fn launch(&mut self) -> ! {
        unsafe {
            cortex_m::interrupt::disable();
            cortex_m::asm::dsb();
            cortex_m::asm::isb();
            // Thumb entry: bit 0 set.
            jump_to_entry(EXEC_BASE | 1)
        }
    }
}

unsafe fn jump_to_entry(entry: u32) -> ! {
    core::arch::asm!(
        "bx {entry}",
        entry = in(reg) entry,
        options(noreturn)
    );
}
