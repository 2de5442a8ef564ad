/*
 * Scheduler Configuration Constants
 *
 * Centralizes the tunables the rest of the scheduler core reads, the way
 * the teacher's original scheduler centralized `THREAD_STACK_SIZE` and
 * `MAX_THREADS` at the top of `scheduler/mod.rs`.
 */

/// Largest identifier the allocator will ever hand out.
pub const MAX_PID: u32 = 4096;

/// Reserved `tid` for the idle task. The idle task is a secondary thread
/// of the kernel process (`pid == 0`), not a process in its own right, so
/// it never competes with `create_new_pid`'s main-thread-only traversal;
/// parking it one past `MAX_PID` makes that true by construction rather
/// than by coincidence.
pub const IDLE_TASK_TID: u32 = MAX_PID + 1;

/// Timer ticks a task may consume before `need_reschedule` considers it
/// to have exhausted its quantum.
pub const TIME_SLOT_TICKS: u32 = 10;

/// Stack size given to every kernel task, including the idle task.
pub const TASK_STACK_SIZE: usize = 64 * 1024;

/// Name given to the idle task, for logging.
pub const IDLE_TASK_NAME: &str = "idle";

/// Kernel code segment selector (from the GDT), used to build the initial
/// interrupt frame for a freshly created task.
pub const KERNEL_CODE_SELECTOR: u64 = 0x08;

/// Kernel data segment selector (from the GDT).
pub const KERNEL_DATA_SELECTOR: u64 = 0x10;

/// RFLAGS value for a new task: interrupts enabled (IF), reserved bit 1 set.
pub const INITIAL_RFLAGS: u64 = 0x202;
