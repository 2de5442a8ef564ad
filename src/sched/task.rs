/*
 * Task Record
 *
 * The per-task data model: identifier, lifecycle state, accounting
 * counters, and the saved CPU context needed to resume it. Tasks are
 * owned by the scheduler's task index (`sched::index`) and referenced
 * from at most one state list at a time (`sched::state_lists`).
 */

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

use super::config;
use super::io_wait::IoChannel;
use super::process::Process;

/// Task identifier. `Tid(0)` is reserved for the kernel bootstrap task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub u32);

/// Process identifier. For the main thread of a process, `pid == tid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

/// Task lifecycle state. Read atomically from interrupt context; writes
/// are protected by the preemption gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Invalid = 0,
    Runnable = 1,
    Running = 2,
    Sleeping = 3,
    Zombie = 4,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => TaskState::Runnable,
            2 => TaskState::Running,
            3 => TaskState::Sleeping,
            4 => TaskState::Zombie,
            _ => TaskState::Invalid,
        }
    }
}

/// Atomic cell holding a task's state. Per the concurrency model, writes
/// that publish list membership use release ordering; loads used to
/// classify a task for list placement use relaxed ordering.
pub struct AtomicTaskState(AtomicU8);

impl AtomicTaskState {
    pub fn new(state: TaskState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// What a sleeping task is waiting on. `None` for every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitObject {
    Io(IoChannel),
    Timer { wake_at_tick: u64 },
}

/// Interrupt frame pushed by the CPU when an interrupt occurs, in the
/// exact order x86_64 pushes it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptFrame {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl Default for InterruptFrame {
    fn default() -> Self {
        Self {
            rip: 0,
            cs: config::KERNEL_CODE_SELECTOR,
            rflags: config::INITIAL_RFLAGS,
            rsp: 0,
            ss: config::KERNEL_DATA_SELECTOR,
        }
    }
}

/// Complete saved CPU context for a preempted or not-yet-run task:
/// general purpose registers plus the CPU-pushed interrupt frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub iret_frame: InterruptFrame,
}

/// A schedulable execution context: a kernel thread or a user-space thread.
pub struct Task {
    pub tid: Tid,
    pub pid: Pid,
    pub name: String,
    state: AtomicTaskState,
    pub time_slot_ticks: u32,
    pub total_ticks: u64,
    pub total_kernel_ticks: u64,
    pub running_in_kernel: bool,
    pub pi: Arc<Mutex<Process>>,
    pub wobj: Option<WaitObject>,
    pub is_tasklet_runner: bool,
    pub context: InterruptContext,
    /// Backing stack storage. Kept alive for as long as the task exists;
    /// `context.iret_frame.rsp` points somewhere inside it.
    _stack: Box<[u8]>,
}

impl Task {
    /// Build a task record ready to run for the first time: its saved
    /// context looks as if it had just been interrupted at `entry`, so
    /// the first `switch_to_task` resumes it via `iretq` straight into
    /// the entry function on an empty stack.
    pub fn new_kernel_task(
        tid: Tid,
        pid: Pid,
        name: String,
        entry: fn() -> !,
        pi: Arc<Mutex<Process>>,
        stack_size: usize,
    ) -> Self {
        let mut stack = alloc::vec![0u8; stack_size].into_boxed_slice();
        let stack_top = stack.as_mut_ptr() as u64 + stack_size as u64;

        let mut context = InterruptContext::default();
        context.iret_frame.rip = entry as u64;
        context.iret_frame.rsp = stack_top;

        Self {
            tid,
            pid,
            name,
            state: AtomicTaskState::new(TaskState::Runnable),
            time_slot_ticks: 0,
            total_ticks: 0,
            total_kernel_ticks: 0,
            running_in_kernel: true,
            pi,
            wobj: None,
            is_tasklet_runner: false,
            context,
            _stack: stack,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state.load()
    }

    pub fn set_state(&self, state: TaskState) {
        self.state.store(state);
    }

    pub fn is_main_thread(&self) -> bool {
        self.tid.0 == self.pid.0
    }
}
