// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_std]
#![no_main]

use {
    core::{
        arch::global_asm,
        fmt::Write,
        panic::PanicInfo,
        sync::atomic::{compiler_fence, Ordering::SeqCst},
    },
    croc_ascon::{regs::Mmio, selftest, status::Poller, uart::Uart},
};

global_asm!(include_str!("../start.S"));

// Croc runs from a 20MHz reference clock
const CLOCK_SPEED: u32 = 20_000_000;
const BAUD_RATE: u32 = 115_200;

// Polls per echoed byte, well above one character time at 115200 baud
const LOOPBACK_POLLS: u32 = 100_000;

#[cfg(feature = "heap")]
const HEAP_SIZE: usize = 2048;

#[cfg(feature = "heap")]
#[global_allocator]
static HEAP: embedded_alloc::Heap = embedded_alloc::Heap::empty();

#[no_mangle]
fn _entry() -> ! {
    extern "C" {
        // These symbols come from `link.ld`
        static mut _sbss: u32;
        static mut _ebss: u32;
    }

    // Initialize RAM
    unsafe {
        r0::zero_bss(
            core::ptr::addr_of_mut!(_sbss),
            core::ptr::addr_of_mut!(_ebss),
        );
    }

    #[cfg(feature = "heap")]
    {
        use core::mem::MaybeUninit;
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as usize, HEAP_SIZE) }
    }

    let mut uart = Uart::new();
    uart.init(CLOCK_SPEED, BAUD_RATE);

    #[cfg(feature = "logging")]
    croc_ascon::logging::init_logging(Uart::new(), log::LevelFilter::Info);

    writeln!(uart, "ASCON accelerator self-test").ok();
    uart.flush();

    if uart.loopback_check("internal msg\n", LOOPBACK_POLLS) {
        writeln!(uart, "UART loopback passed").ok();
    } else {
        writeln!(uart, "UART loopback FAILED").ok();
    }

    match selftest::run(&mut Mmio::new(), &mut uart, Poller::default()) {
        Ok(summary) => writeln!(uart, "{summary}").ok(),
        Err(e) => writeln!(uart, "self-test aborted: {e}").ok(),
    };
    uart.flush();

    loop {
        unsafe { riscv::asm::wfi() }
    }
}

#[inline(never)]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    let mut console = Uart::new();

    compiler_fence(SeqCst);
    writeln!(console, "{}", _info).ok();
    console.flush();

    loop {
        unsafe { riscv::asm::wfi() }
    }
}
