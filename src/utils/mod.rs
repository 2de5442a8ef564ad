/*
 * Kernel Utilities and Support Functions
 *
 * This module contains various utility functions, macros, and support
 * code used throughout the kernel. It provides common functionality
 * like logging, text output, and debugging macros.
 *
 * Why this is important:
 * - Provides essential debugging and logging infrastructure
 * - Implements kernel-specific versions of common operations
 * - Enables consistent formatting and output across the kernel
 * - Provides macros for simplified kernel development
 * - Forms the support infrastructure for kernel debugging
 *
 * Key components:
 * - io: serial writer, framebuffer console, and print/debug macros
 * - debug: ring-buffer-backed structured logger
 * - ui: line editing
 * - timer: timer tick bookkeeping used by the IRQ handler
 */

#[macro_use]
pub mod io;
pub mod debug;
pub mod ui;
pub mod timer;
