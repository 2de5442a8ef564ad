/*
 * BOOTBOOT Protocol Structures
 *
 * The kernel boots under the BOOTBOOT loader protocol: the loader maps a fixed
 * set of structures at well-known virtual addresses before jumping to
 * `_start`, rather than passing a pointer on the stack. This module
 * mirrors the public `bootboot.h` layout (zlib, github.com/bztsrc/bootboot)
 * closely enough for the kernel's memory, initrd, and framebuffer code to
 * read it; the exact field offsets matter; `_start`'s naked prologue reads
 * `bspid` straight out of this layout at offset 0x0C.
 *
 * `bootboot`, `fb`, and `environment` are provided by the linker script
 * (not part of this crate's source), which places them at the addresses
 * the loader guarantees to map: `bootboot` at 0xffffffffffe00000, `fb` at
 * 0xfffffffff8000000, `environment` immediately after `bootboot`.
 */

/// Memory map entry type: never used by the firmware, free for the OS.
pub const MMAP_USED: u32 = 0;
/// Usable RAM.
pub const MMAP_FREE: u32 = 1;
/// ACPI reclaimable memory.
pub const MMAP_ACPI: u32 = 2;
/// Memory-mapped I/O, never usable as RAM.
pub const MMAP_MMIO: u32 = 3;

/// Virtual address BOOTBOOT links the kernel's `.text` at.
pub const BOOTBOOT_CORE: u64 = 0xffff_ffff_ffe0_0000;

/// One memory map entry. `size`'s low 4 bits hold the region type
/// (`MMAP_*`); the actual size is `size & !0xF`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MMapEnt {
    pub ptr: u64,
    pub size: u64,
}

/// The structure BOOTBOOT maps at a fixed virtual address before
/// entering the kernel. Field layout, including the architecture union
/// (flattened here to eight `u64`s — only `x86_64`'s first four are
/// meaningful: acpi_ptr, smbi_ptr, efi_ptr, mp_ptr), must match the
/// loader's `bootboot.h` exactly: 128 bytes of fixed header followed by
/// a variable-length array of `MMapEnt`, `mmap` being the first entry.
#[repr(C)]
pub struct BOOTBOOT {
    pub magic: [u8; 4],
    pub size: u32,
    pub protocol: u8,
    pub fb_type: u8,
    pub numcores: u16,
    pub bspid: u16,
    pub timezone: i16,
    pub datetime: [u8; 8],
    pub initrd_ptr: u64,
    pub initrd_size: u64,
    pub fb_ptr: u64,
    pub fb_size: u32,
    pub fb_width: u32,
    pub fb_height: u32,
    pub fb_scanline: u32,
    pub arch: [u64; 8],
    pub mmap: MMapEnt,
}

unsafe extern "C" {
    /// The boot information structure, mapped read-only at a fixed
    /// virtual address by the loader.
    pub static bootboot: BOOTBOOT;
    /// First byte of the linear framebuffer, mapped at a fixed virtual
    /// address. Indexed as a raw byte array; `fb_scanline`/`fb_width`/
    /// `fb_height` describe its layout.
    pub static mut fb: u8;
    /// NUL-separated `key=value` environment strings the loader passes
    /// through from its config file.
    pub static environment: [u8; 4096];
}
