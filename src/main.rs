/*
 * Task Scheduler Kernel Main Entry Point
 *
 * This is the main entry point for the teaching-OS kernel, a bare-metal Rust kernel
 * designed to work with the BOOTBOOT bootloader protocol. It handles the critical
 * early boot process and kernel initialization.
 *
 * Why this is important:
 * - Provides the entry point that BOOTBOOT calls when loading the kernel
 * - Handles multi-core boot process (BSP vs AP core management)
 * - Sets up proper kernel stack before entering Rust code
 * - Implements panic handling for kernel-level errors
 * - Coordinates the overall kernel initialization sequence
 *
 * Key features:
 * - Multi-core aware boot process
 * - Proper stack management for kernel execution
 * - Integration with BOOTBOOT protocol
 * - Safe transition from assembly to Rust code
 * - Comprehensive error handling and logging
 *
 * `_start`, `kstart`, and the panic handler only exist in the real no_std
 * kernel build: under `cargo test` this crate compiles as an ordinary std
 * binary so the `#[cfg(test)]` unit tests scattered through `sched::*`
 * can run on the host, and those three pieces would collide with std's
 * own entry point and panic machinery.
 */

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;

mod arch;
mod bootboot;
mod components;
mod drivers;
mod fs;
mod initrd;
mod io;
mod memory;
mod sched;
mod tasklet;
mod utils;

/// A kernel thread spawned during boot to demonstrate the scheduler core
/// running something other than the bootstrap and idle tasks: it blocks
/// on keyboard input and echoes each line to the console, exercising
/// `sched::io_wait` end to end.
fn keyboard_echo_thread() -> ! {
    loop {
        let ch = drivers::input::keyboard::read_char_blocking();
        match ch {
            '\r' | '\n' => utils::io::console::write_str("\n"),
            _ => utils::io::console::write_char(ch),
        }
    }
}

/// A second demo kernel thread, purely CPU-bound, so the least-ticks
/// policy has more than one runnable candidate to choose between.
fn counter_thread() -> ! {
    let mut ticks: u64 = 0;
    loop {
        ticks = ticks.wrapping_add(1);
        if ticks % 50_000_000 == 0 {
            log::debug!("counter_thread: {} iterations", ticks);
        }
        sched::engine::yield_now();
    }
}

#[cfg(not(test))]
mod boot {
    use super::*;
    use core::panic::PanicInfo;

    #[repr(C, align(16))]
    pub struct AlignedBspStack([u8; 64 * 1024]);

    #[unsafe(no_mangle)]
    pub static mut BSP_STACK: AlignedBspStack = AlignedBspStack([0; 64 * 1024]);

    /// ===============================
    ///  EARLY ENTRY POINT (_start)
    /// ===============================
    ///
    /// Called directly by BOOTBOOT loader on ALL CORES.
    /// Required to:
    ///   - Identify BSP using bootboot.bspid
    ///   - Switch to our own 64 KiB kernel stack
    ///   - Call into Rust's `kstart`
    ///   - Park APs
    ///
    #[unsafe(naked)]
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn _start() -> ! {
        core::arch::naked_asm!(
            // CPUID leaf 1 → EBX[31:24] = APIC ID
            "mov eax, 1",
            "cpuid",
            "shr ebx, 24",                 // EBX now holds core ID

            // Load &bootboot into RAX
            "lea rax, [rip + bootboot]",

            // Read bspid (u16 @ offset 0x0C)
            "movzx ecx, word ptr [rax + 0x0C]",

            // Compare APIC ID vs bspid
            "cmp ebx, ecx",
            "jne 2f",                      // If not BSP → jump to AP section

            // =======================
            //       BSP PATH
            // =======================

            // Switch to our 64 KiB BSP stack
            "lea rax, [rip + BSP_STACK]",
            "add rax, {stack_size}",
            "mov rsp, rax",

            // Jump into real Rust kernel entry
            "jmp kstart",

            // =======================
            //       AP PATH
            // =======================
            //
            // Secondary cores are never brought up; they park here.
            "2:",
            "1:",
            "hlt",
            "jmp 1b",

            stack_size = const 64 * 1024,
        );
    }

    /// ===============================
    ///  RUST KERNEL ENTRY POINT
    /// ===============================
    ///
    /// Now running on our safe, large BSP stack. APs never run this
    /// function.
    ///
    #[unsafe(no_mangle)]
    pub extern "C" fn kstart() -> ! {
        utils::debug::init_debug_infrastructure();

        utils::debug::logger::init(true);
        log::info!("Kernel starting...");

        arch::x86_64::gdt::init();

        // Must be initialized before memory management (CR3 switch): if
        // any exception or NMI fires during the switch with no IDT set
        // up, the CPU triple faults.
        arch::x86_64::idt::init();

        log::info!("Initializing memory management...");
        unsafe {
            memory::init(core::ptr::addr_of!(bootboot::bootboot));
        }

        {
            use alloc::vec::Vec;
            let mut test_vec = Vec::new();
            test_vec.push(42);
            test_vec.push(1337);
            log::info!("Heap test successful: {:?}", test_vec);
        }
        log::info!("Memory management initialized successfully");

        initrd::init();

        drivers::system::init();
        drivers::display::init();
        drivers::input::init();
        drivers::input::keyboard::init_keyboard();

        utils::io::console::init();
        components::tty::init_tty0();
        log::info!("TTY system initialized");

        sched::engine::init_sched();
        sched::selftest::run();

        match sched::engine::spawn_kernel_thread("counter", super::counter_thread) {
            Ok(tid) => log::info!("spawned counter thread, tid {}", tid.0),
            Err(e) => log::error!("failed to spawn counter thread: {:?}", e),
        }
        match sched::engine::spawn_kernel_thread("keyboard_echo", super::keyboard_echo_thread) {
            Ok(tid) => log::info!("spawned keyboard echo thread, tid {}", tid.0),
            Err(e) => log::error!("failed to spawn keyboard echo thread: {:?}", e),
        }

        x86_64::instructions::interrupts::enable();
        log::info!("interrupts enabled, scheduler running");

        // The bootstrap thread becomes the kernel's own idle fallback:
        // timer interrupts preempt it and switch to whichever task the
        // least-ticks policy or a ready tasklet runner selects.
        loop {
            x86_64::instructions::hlt();
        }
    }

    ///  PANIC HANDLER
    /// ===============================
    ///
    /// Logging may fail early, but this is safe once the logger is up.
    ///
    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        x86_64::instructions::interrupts::disable();

        if let Some(location) = info.location() {
            log::error!(
                "PANIC at {}:{}: {}",
                location.file(),
                location.line(),
                info.message()
            );
        } else {
            log::error!("PANIC: {}", info.message());
        }

        loop {
            x86_64::instructions::hlt();
        }
    }
}
