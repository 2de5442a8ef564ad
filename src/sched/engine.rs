/*
 * Scheduler Engine
 *
 * The single process-wide scheduler value and the entry points the rest
 * of the kernel drives it through. Grounded in the teacher's own
 * `scheduler::mod` (the `SCHEDULER: Mutex<Option<Scheduler>>` singleton,
 * the `CURRENT_THREAD_ID` atomic, and the naked-asm interrupt trampolines
 * that call back into a C-ABI `schedule_from_interrupt`), generalized
 * from round-robin to the least-ticks heuristic with a tasklet-runner
 * fast path and an explicit idle task.
 */

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::arch::naked_asm;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spin::Mutex;

use super::config::{IDLE_TASK_NAME, IDLE_TASK_TID, TASK_STACK_SIZE, TIME_SLOT_TICKS};
use super::index::TaskIndex;
use super::pid::{PidAllocator, SchedError};
use super::process::Process;
use super::state_lists::StateLists;
use super::task::{InterruptContext, Pid, Task, TaskState, Tid, WaitObject};
use crate::tasklet;

/// Sentinel passed to `schedule`/`switch_to_task` meaning "not called
/// from an interrupt handler for a specific IRQ".
pub const NO_IRQ: i32 = -1;

struct Scheduler {
    index: TaskIndex,
    lists: StateLists,
    pid_alloc: PidAllocator,
    idle_tid: Tid,
    idle_ticks: u64,
}

impl Scheduler {
    const fn new() -> Self {
        Self {
            index: TaskIndex::new(),
            lists: StateLists::new(),
            pid_alloc: PidAllocator::new(),
            idle_tid: Tid(IDLE_TASK_TID),
            idle_ticks: 0,
        }
    }

    fn push_to_state_list(&mut self, tid: Tid, state: TaskState) {
        if tasklet::is_tasklet_runner(tid) {
            return;
        }
        // A task on two state lists at once means the index and the
        // lists have diverged; checked in release builds too.
        assert!(
            !(self.lists.contains_runnable(tid) || self.lists.contains_sleeping(tid) || self.lists.contains_zombie(tid)),
            "task already present on a state list"
        );
        match state {
            TaskState::Runnable => self.lists.push_runnable(tid),
            TaskState::Sleeping => self.lists.push_sleeping(tid),
            TaskState::Zombie => self.lists.push_zombie(tid),
            TaskState::Running | TaskState::Invalid => {}
        }
    }

    fn remove_from_state_list(&mut self, tid: Tid, state: TaskState) {
        match state {
            TaskState::Runnable => {
                self.lists.remove_runnable(tid);
            }
            TaskState::Sleeping => {
                self.lists.remove_sleeping(tid);
            }
            TaskState::Zombie => {
                self.lists.remove_zombie(tid);
            }
            TaskState::Running | TaskState::Invalid => {}
        }
    }
}

static SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());
static CURRENT_TID: AtomicU32 = AtomicU32::new(0);
static SCHEDULER_ENABLED: AtomicBool = AtomicBool::new(false);
static PREEMPTION: super::preempt::PreemptionGate = super::preempt::PreemptionGate::new();

/// Whether the scheduler has been enabled by `init_sched`. Read by the
/// page-fault-adjacent debug log buffer to decide whether it is safe to
/// reason about "the current task" yet.
pub fn is_enabled() -> bool {
    SCHEDULER_ENABLED.load(Ordering::SeqCst)
}

pub fn get_curr_task_tid() -> Tid {
    Tid(CURRENT_TID.load(Ordering::SeqCst))
}

pub fn disable_preemption() {
    PREEMPTION.disable();
}

pub fn enable_preemption() {
    PREEMPTION.enable();
}

pub fn is_preemption_enabled() -> bool {
    PREEMPTION.is_enabled()
}

/// Run `f` with shared access to the task record for `tid`.
pub fn with_task<R>(tid: Tid, f: impl FnOnce(&Task) -> R) -> Option<R> {
    let sched = SCHEDULER.lock();
    sched.index.get(tid).map(f)
}

/// Run `f` with exclusive access to the task record for `tid`.
pub fn with_task_mut<R>(tid: Tid, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
    let mut sched = SCHEDULER.lock();
    sched.index.get_mut(tid).map(f)
}

/// Run `f` with shared access to the currently running task's record.
pub fn with_current_task<R>(f: impl FnOnce(&Task) -> R) -> Option<R> {
    with_task(get_curr_task_tid(), f)
}

/// Ascending traversal of the task index. `visitor` returning non-zero
/// stops the traversal early; its return value is propagated.
///
/// Asserts preemption is disabled, per the core's contract: callers must
/// bracket this with `disable_preemption`/`enable_preemption`.
pub fn iterate_over_tasks(visitor: impl FnMut(&Task) -> i32) -> i32 {
    debug_assert!(!PREEMPTION.is_enabled(), "iterate_over_tasks called with preemption enabled");
    let sched = SCHEDULER.lock();
    sched.index.iterate(visitor)
}

pub fn get_task_count() -> usize {
    SCHEDULER.lock().index.len()
}

/// Number of tasks currently on the runnable list. Mirrors
/// `StateLists::runnable_count`; exposed so callers outside this module
/// (the idle loop, boot-time diagnostics) don't need their own lock.
pub fn runnable_count() -> usize {
    SCHEDULER.lock().lists.runnable_count()
}

/// Allocate a fresh process identifier. Preemption must be disabled;
/// asserted in debug builds.
pub fn create_new_pid() -> Result<Pid, SchedError> {
    debug_assert!(!PREEMPTION.is_enabled(), "create_new_pid called with preemption enabled");
    let mut sched = SCHEDULER.lock();
    let index = &sched.index;
    sched.pid_alloc.allocate(index)
}

/// Register a newly created task: insert into the index and, unless it
/// is a tasklet runner, onto the state list matching its current state.
pub fn add_task(task: Box<Task>) -> Result<(), SchedError> {
    disable_preemption();
    let result = (|| {
        let tid = task.tid;
        let state = task.state();
        let mut sched = SCHEDULER.lock();
        sched
            .index
            .insert(task)
            .map_err(|_| SchedError::DuplicateIdentifier)?;
        sched.push_to_state_list(tid, state);
        Ok(())
    })();
    enable_preemption();
    result
}

/// Tear down a task. It must be in state `Zombie`; unlinks it from the
/// zombie list and the index and returns the record for the allocator
/// to reclaim its storage.
pub fn remove_task(tid: Tid) -> Result<Box<Task>, SchedError> {
    disable_preemption();
    let result = (|| {
        let mut sched = SCHEDULER.lock();
        let state = sched.index.get(tid).ok_or(SchedError::NoSuchTask)?.state();
        if state != TaskState::Zombie {
            return Err(SchedError::NotZombie);
        }
        sched.lists.remove_zombie(tid);
        let task = sched.index.remove(tid).ok_or(SchedError::NoSuchTask)?;
        task.pi.lock().remove_thread(tid);
        Ok(task)
    })();
    enable_preemption();
    result
}

/// Move a task to `new_state`, keeping its state-list membership in
/// step. `new_state` must differ from the task's current state and must
/// not be `Zombie` (tasks enter `Zombie` through the exit path).
pub fn task_change_state(tid: Tid, new_state: TaskState) {
    debug_assert_ne!(new_state, TaskState::Zombie, "use the exit path to zombify a task");

    disable_preemption();
    {
        let mut sched = SCHEDULER.lock();
        let old_state = match sched.index.get(tid) {
            Some(task) => task.state(),
            None => {
                enable_preemption();
                return;
            }
        };
        debug_assert_ne!(old_state, new_state, "task_change_state called with no state change");

        sched.remove_from_state_list(tid, old_state);
        if let Some(task) = sched.index.get(tid) {
            task.set_state(new_state);
        }
        sched.push_to_state_list(tid, new_state);
    }
    enable_preemption();
}

/// Block the current task on `wobj`, transitioning it to `Sleeping`.
pub fn block_current_task(wobj: WaitObject) {
    let tid = get_curr_task_tid();
    if tid.0 == 0 {
        return;
    }
    disable_preemption();
    {
        let mut sched = SCHEDULER.lock();
        if let Some(task) = sched.index.get_mut(tid) {
            let old_state = task.state();
            task.wobj = Some(wobj);
            sched.remove_from_state_list(tid, old_state);
            if let Some(task) = sched.index.get(tid) {
                task.set_state(TaskState::Sleeping);
            }
            sched.push_to_state_list(tid, TaskState::Sleeping);
        }
    }
    enable_preemption();
}

/// Wake a sleeping task, moving it back to `Runnable`.
pub fn wake_task(tid: Tid) {
    disable_preemption();
    {
        let mut sched = SCHEDULER.lock();
        let should_wake = sched
            .index
            .get(tid)
            .map(|t| t.state() == TaskState::Sleeping)
            .unwrap_or(false);
        if should_wake {
            sched.remove_from_state_list(tid, TaskState::Sleeping);
            if let Some(task) = sched.index.get_mut(tid) {
                task.wobj = None;
                task.set_state(TaskState::Runnable);
            }
            sched.push_to_state_list(tid, TaskState::Runnable);
        }
    }
    enable_preemption();
}

/// Tick accounting, called once per scheduler tick from the timer
/// interrupt. Increments the current task's `time_slot_ticks` and
/// `total_ticks`, plus `total_kernel_ticks` while executing kernel code.
pub fn account_ticks() {
    let tid = get_curr_task_tid();
    let mut sched = SCHEDULER.lock();
    if tid == sched.idle_tid {
        sched.idle_ticks += 1;
        return;
    }
    if let Some(task) = sched.index.get_mut(tid) {
        task.time_slot_ticks += 1;
        task.total_ticks += 1;
        if task.running_in_kernel {
            task.total_kernel_ticks += 1;
        }
    }
}

/// Cheap predicate evaluated from the timer interrupt to decide whether
/// `schedule` should run at all this tick.
pub fn need_reschedule() -> bool {
    let current_tid = get_curr_task_tid();

    if let Some(runner) = tasklet::get_hi_prio_ready_tasklet_runner() {
        if runner != current_tid {
            return true;
        }
    }

    let sched = SCHEDULER.lock();
    match sched.index.get(current_tid) {
        Some(task) => task.time_slot_ticks >= TIME_SLOT_TICKS || task.state() != TaskState::Running,
        None => true,
    }
}

/// Pick the runnable candidate with the smallest `total_ticks`, skipping
/// the idle task and `exclude`. Ties go to whichever is encountered
/// first (list order).
fn pick_least_ticks_candidate(sched: &Scheduler, exclude: Tid) -> Option<Tid> {
    let mut best: Option<(Tid, u64)> = None;
    for &tid in sched.lists.runnable.iter() {
        if tid == exclude || tid == sched.idle_tid {
            continue;
        }
        let Some(task) = sched.index.get(tid) else { continue };
        let ticks = task.total_ticks;
        match best {
            Some((_, best_ticks)) if best_ticks <= ticks => {}
            _ => best = Some((tid, ticks)),
        }
    }
    best.map(|(tid, _)| tid)
}

/// Select the next task to run and, if a switch is warranted, hand off
/// to the architecture context-switch primitive. `curr_irq` is `NO_IRQ`
/// when not called from an interrupt handler, otherwise the IRQ vector
/// the caller is servicing.
///
/// Caller must have preemption disabled on entry; it stays disabled
/// across the switch, restored by the next task's own saved state.
pub fn schedule(curr_irq: i32) {
    debug_assert!(!PREEMPTION.is_enabled(), "schedule called with preemption enabled");

    let current_tid = get_curr_task_tid();
    let tasklet_runner = tasklet::get_hi_prio_ready_tasklet_runner();

    if tasklet_runner == Some(current_tid) {
        return;
    }

    let mut sched = SCHEDULER.lock();

    if let Some(task) = sched.index.get(current_tid) {
        if task.state() == TaskState::Running {
            task.set_state(TaskState::Runnable);
            sched.push_to_state_list(current_tid, TaskState::Runnable);
        }
    }

    let selected = if let Some(runner) = tasklet_runner {
        runner
    } else if let Some(candidate) = pick_least_ticks_candidate(&sched, current_tid) {
        candidate
    } else if sched
        .index
        .get(current_tid)
        .map(|t| t.state() == TaskState::Runnable)
        .unwrap_or(false)
    {
        sched.lists.remove_runnable(current_tid);
        if let Some(task) = sched.index.get(current_tid) {
            task.set_state(TaskState::Running);
            task.time_slot_ticks = 0;
        }
        return;
    } else {
        sched.idle_tid
    };

    // Whatever was picked above — tasklet runner, least-ticks candidate, or
    // idle — may currently sit on the runnable list (the demote step above
    // can have just pushed idle back onto it); unlink it unconditionally so
    // `push_to_state_list` never finds it there a second time on a later
    // preemption.
    sched.lists.remove_runnable(selected);
    if let Some(task) = sched.index.get(selected) {
        task.set_state(TaskState::Running);
        task.time_slot_ticks = 0;
    }
    drop(sched);

    CURRENT_TID.store(selected.0, Ordering::SeqCst);
    unsafe {
        switch_to_task(selected, curr_irq);
    }
}

pub fn schedule_outside_interrupt_context() {
    schedule(NO_IRQ);
}

/// Force an immediate switch to the idle task. Non-returning.
pub fn switch_to_idle_task(curr_irq: i32) -> ! {
    let idle_tid = SCHEDULER.lock().idle_tid;
    CURRENT_TID.store(idle_tid.0, Ordering::SeqCst);
    unsafe {
        switch_to_task(idle_tid, curr_irq);
    }
    unreachable!("switch_to_task does not return")
}

pub fn switch_to_idle_task_outside_interrupt_context() -> ! {
    switch_to_idle_task(NO_IRQ)
}

/// Architecture-specific context-switch primitive. Never returns to the
/// caller along this path: the calling frame is preserved in the
/// previous task's saved context and resumed later as if this call had
/// returned.
///
/// # Safety
/// Must be called with preemption disabled and a valid `tid` present in
/// the task index.
unsafe fn switch_to_task(tid: Tid, curr_irq: i32) {
    let ctx_ptr: *const InterruptContext = {
        let sched = SCHEDULER.lock();
        match sched.index.get(tid) {
            Some(task) => &task.context as *const InterruptContext,
            None => return,
        }
    };

    unsafe {
        load_context_and_resume(ctx_ptr, curr_irq);
    }
}

/// Loads `ctx` into the CPU and resumes via `iretq`. Used both for the
/// very first dispatch of a task (called from ordinary Rust code, never
/// returns) and conceptually mirrors the tail of the interrupt
/// trampolines below. `curr_irq >= 0` triggers a PIC EOI first.
unsafe fn load_context_and_resume(ctx: *const InterruptContext, curr_irq: i32) -> ! {
    if curr_irq >= 0 {
        unsafe {
            crate::arch::x86_64::idt::pic_eoi(curr_irq as u8);
        }
    }
    unsafe {
        core::arch::asm!(
            "mov rsp, {ctx}",
            "pop r15", "pop r14", "pop r13", "pop r12",
            "pop r11", "pop r10", "pop r9", "pop r8",
            "pop rbp", "pop rdi", "pop rsi", "pop rdx",
            "pop rcx", "pop rbx", "pop rax",
            "iretq",
            ctx = in(reg) ctx,
            options(noreturn),
        );
    }
}

/// Voluntary yield: triggers `INT 0x81`, which runs the same
/// context-switch path as the timer interrupt.
pub fn yield_now() {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    if !crate::arch::x86_64::interrupts::are_enabled() {
        return;
    }
    unsafe {
        core::arch::asm!("int 0x81", options(nostack));
    }
}

/// Called once per scheduler tick from `utils::timer::on_timer_interrupt`.
/// Runs tick accounting and, if warranted, invokes the engine.
pub fn on_timer_tick() {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    if !PREEMPTION.is_enabled() {
        return;
    }
    account_ticks();
    if need_reschedule() {
        disable_preemption();
        schedule(0);
        enable_preemption();
    }
}

/// Software interrupt handler for voluntary yielding (`INT 0x81`).
/// Identical to the timer trampoline except it never sends a PIC EOI.
#[unsafe(naked)]
pub unsafe extern "C" fn yield_interrupt_handler() {
    naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {schedule_fn}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "iretq",
        schedule_fn = sym schedule_from_interrupt,
    )
}

/// Preemptive timer interrupt handler (IRQ0, hardware). Saves the full
/// register set atop the CPU-pushed interrupt frame, asks the scheduler
/// for the next context, restores it, EOIs the PIC, and resumes via
/// `iretq`.
#[unsafe(naked)]
pub unsafe extern "C" fn preemptive_timer_interrupt_handler() {
    naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {schedule_fn}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "push rax",
        "mov al, 0x20",
        "out 0x20, al",
        "pop rax",
        "iretq",
        schedule_fn = sym schedule_from_interrupt,
    )
}

/// Called from the naked trampolines with a pointer to the interrupted
/// task's `InterruptContext` already on the stack. Runs tick accounting,
/// picks the next task per the `schedule` policy, and returns a pointer
/// to the context to resume. Must not block.
#[unsafe(no_mangle)]
pub extern "C" fn schedule_from_interrupt(current_ctx_ptr: *const InterruptContext) -> *const InterruptContext {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        return current_ctx_ptr;
    }
    if !PREEMPTION.is_enabled() {
        crate::utils::timer::on_timer_interrupt();
        return current_ctx_ptr;
    }

    crate::utils::timer::on_timer_interrupt();

    let current_tid = get_curr_task_tid();
    let tasklet_runner = tasklet::get_hi_prio_ready_tasklet_runner();

    if tasklet_runner == Some(current_tid) {
        return current_ctx_ptr;
    }

    let mut sched = SCHEDULER.lock();

    if current_tid.0 != 0 || sched.index.contains(current_tid) {
        if let Some(task) = sched.index.get_mut(current_tid) {
            task.context = unsafe { *current_ctx_ptr };
            if task.state() == TaskState::Running {
                task.set_state(TaskState::Runnable);
                sched.push_to_state_list(current_tid, TaskState::Runnable);
            }
        }
    }

    let selected = if let Some(runner) = tasklet_runner {
        runner
    } else if let Some(candidate) = pick_least_ticks_candidate(&sched, current_tid) {
        candidate
    } else if sched
        .index
        .get(current_tid)
        .map(|t| t.state() == TaskState::Runnable)
        .unwrap_or(false)
    {
        current_tid
    } else {
        sched.idle_tid
    };

    // See `schedule`'s matching comment: unlink unconditionally, since the
    // demote step above may have just pushed `selected` (e.g. idle) back
    // onto the runnable list.
    sched.lists.remove_runnable(selected);

    let next_ctx_ptr = match sched.index.get_mut(selected) {
        Some(task) => {
            task.set_state(TaskState::Running);
            task.time_slot_ticks = 0;
            &task.context as *const InterruptContext
        }
        None => return current_ctx_ptr,
    };

    CURRENT_TID.store(selected.0, Ordering::SeqCst);
    next_ctx_ptr
}

/// Create the kernel process (pid 0) and its bootstrap task (tid 0),
/// matching the boot-time scenario: the bootstrap task is inserted in
/// state `Sleeping` and designated the current task before the idle
/// task or any other task exists. `running_in_kernel` is true, `cwd` is
/// "/", per the invariants this represents the already-executing boot
/// code rather than a task dispatched through `switch_to_task`.
pub fn create_kernel_process() -> Arc<Mutex<Process>> {
    let process = Arc::new(Mutex::new(Process::new_kernel(Pid(0))));

    fn bootstrap_entry() -> ! {
        unreachable!("the bootstrap task is never dispatched through switch_to_task")
    }

    let mut task = Task::new_kernel_task(
        Tid(0),
        Pid(0),
        String::from("kernel"),
        bootstrap_entry,
        process.clone(),
        TASK_STACK_SIZE,
    );
    task.set_state(TaskState::Sleeping);
    process.lock().add_thread(Tid(0));

    {
        let mut sched = SCHEDULER.lock();
        sched.index.insert(Box::new(task)).expect("tid 0 inserted twice during boot");
        sched.push_to_state_list(Tid(0), TaskState::Sleeping);
    }

    CURRENT_TID.store(0, Ordering::SeqCst);
    process
}

fn idle_task_main() -> ! {
    loop {
        x86_64::instructions::hlt();
        let runnable = runnable_count();
        if runnable > 0 {
            yield_now();
        }
    }
}

/// One-shot boot-time initialization: creates the kernel process and
/// bootstrap task, creates the idle task, then enables preemption and
/// the scheduler itself. Must be called exactly once, after interrupts
/// and the heap are set up but before any other task is spawned.
pub fn init_sched() {
    let kernel_process = create_kernel_process();

    let idle_task = Task::new_kernel_task(
        Tid(IDLE_TASK_TID),
        Pid(0),
        String::from(IDLE_TASK_NAME),
        idle_task_main,
        kernel_process.clone(),
        TASK_STACK_SIZE,
    );
    kernel_process.lock().add_thread(Tid(IDLE_TASK_TID));

    {
        let mut sched = SCHEDULER.lock();
        sched
            .index
            .insert(Box::new(idle_task))
            .expect("idle task tid collided during boot");
        sched.idle_tid = Tid(IDLE_TASK_TID);
        // The idle task is never placed on the runnable list: it is only
        // ever reached via the idle fallback step of `schedule`.
    }

    enable_preemption();
    SCHEDULER_ENABLED.store(true, Ordering::SeqCst);
    log::info!("scheduler enabled");
}

/// Smallest `Tid` not currently present in the index, skipping 0 (reserved
/// for the bootstrap task). Unlike `PidAllocator`, thread identifiers have
/// no fixed ceiling and no monotonic-region preference: threads are
/// short-lived relative to processes, so plain hole reuse is enough.
fn allocate_tid(sched: &Scheduler) -> Tid {
    let mut lowest_available: u64 = 1;
    sched.index.iterate(|task| {
        let t = task.tid.0 as u64;
        if t == lowest_available {
            lowest_available += 1;
        }
        0
    });
    Tid(lowest_available as u32)
}

/// Spawn a new kernel thread in the default kernel process (pid 0).
pub fn spawn_kernel_thread(name: &str, entry: fn() -> !) -> Result<Tid, SchedError> {
    spawn_kernel_thread_in_process(name, entry, Pid(0))
}

/// Spawn a new kernel thread owned by `pid`'s process. `pid` must already
/// have a live main thread in the index.
pub fn spawn_kernel_thread_in_process(name: &str, entry: fn() -> !, pid: Pid) -> Result<Tid, SchedError> {
    disable_preemption();
    let result = (|| {
        let mut sched = SCHEDULER.lock();
        let process = sched
            .index
            .get(Tid(pid.0))
            .ok_or(SchedError::NoSuchTask)?
            .pi
            .clone();

        let tid = allocate_tid(&sched);
        let task = Task::new_kernel_task(tid, pid, String::from(name), entry, process.clone(), TASK_STACK_SIZE);
        let state = task.state();
        sched.index.insert(Box::new(task)).map_err(|_| SchedError::DuplicateIdentifier)?;
        process.lock().add_thread(tid);
        sched.push_to_state_list(tid, state);
        Ok(tid)
    })();
    enable_preemption();
    result
}

/// Spawn an entirely new kernel process: a fresh pid and a main thread
/// (tid == pid) owned by it. Unlike `spawn_kernel_thread_in_process`,
/// this is the path that actually drives `create_new_pid`.
pub fn spawn_kernel_process(name: &str, entry: fn() -> !) -> Result<(Pid, Tid), SchedError> {
    disable_preemption();
    let result = (|| {
        let mut sched = SCHEDULER.lock();
        let pid = {
            let index = &sched.index;
            sched.pid_alloc.allocate(index)?
        };
        let process = Arc::new(Mutex::new(Process::new_kernel(pid)));
        let tid = Tid(pid.0);
        let task = Task::new_kernel_task(tid, pid, String::from(name), entry, process.clone(), TASK_STACK_SIZE);
        let state = task.state();
        sched.index.insert(Box::new(task)).map_err(|_| SchedError::DuplicateIdentifier)?;
        process.lock().add_thread(tid);
        sched.push_to_state_list(tid, state);
        Ok((pid, tid))
    })();
    enable_preemption();
    result
}

/// Terminate the current task with `exit_code`, transitioning it to
/// `Zombie`. Storage is reclaimed later by `remove_task`. Never returns.
///
/// # Panics
/// Panics if called from the bootstrap task (tid 0); that task represents
/// the kernel's own execution and is never meant to exit.
pub fn exit_current_task(exit_code: i32) -> ! {
    let tid = get_curr_task_tid();
    assert!(tid.0 != 0, "the bootstrap task cannot exit");

    disable_preemption();
    {
        let mut sched = SCHEDULER.lock();
        if let Some(task) = sched.index.get(tid) {
            let old_state = task.state();
            sched.remove_from_state_list(tid, old_state);
            if let Some(task) = sched.index.get(tid) {
                task.set_state(TaskState::Zombie);
            }
            sched.push_to_state_list(tid, TaskState::Zombie);

            if let Some(task) = sched.index.get(tid) {
                let mut process = task.pi.lock();
                if task.is_main_thread() || process.threads.iter().all(|&t| t == tid) {
                    process.exit_code = Some(exit_code);
                }
            }
        }
    }
    enable_preemption();

    log::info!("task {} exiting with code {}", tid.0, exit_code);
    yield_now();
    unreachable!("exit_current_task: scheduler resumed an exited task");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::task::Pid as TaskPid;

    fn mock_task(tid: u32, pid: u32) -> Box<Task> {
        fn dummy_entry() -> ! {
            loop {}
        }
        let pi = Arc::new(Mutex::new(Process::new_kernel(TaskPid(0))));
        Box::new(Task::new_kernel_task(
            Tid(tid),
            TaskPid(pid),
            String::from("mock"),
            dummy_entry as fn() -> !,
            pi,
            4096,
        ))
    }

    #[test]
    fn pick_least_ticks_skips_idle_and_current() {
        let mut sched = Scheduler::new();
        let mut a = mock_task(5, 5);
        a.total_ticks = 50;
        let mut b = mock_task(6, 6);
        b.total_ticks = 10;
        let idle = mock_task(IDLE_TASK_TID, 0);

        sched.index.insert(a).unwrap();
        sched.index.insert(b).unwrap();
        sched.index.insert(idle).unwrap();
        sched.idle_tid = Tid(IDLE_TASK_TID);
        sched.lists.push_runnable(Tid(5));
        sched.lists.push_runnable(Tid(6));
        sched.lists.push_runnable(Tid(IDLE_TASK_TID));

        let picked = pick_least_ticks_candidate(&sched, Tid(999));
        assert_eq!(picked, Some(Tid(6)));
    }

    #[test]
    fn pick_least_ticks_excludes_named_task() {
        let mut sched = Scheduler::new();
        let a = mock_task(5, 5);
        let b = mock_task(6, 6);
        sched.index.insert(a).unwrap();
        sched.index.insert(b).unwrap();
        sched.lists.push_runnable(Tid(5));
        sched.lists.push_runnable(Tid(6));

        let picked = pick_least_ticks_candidate(&sched, Tid(5));
        assert_eq!(picked, Some(Tid(6)));
    }

    #[test]
    fn pick_least_ticks_returns_none_when_nothing_eligible() {
        let sched = Scheduler::new();
        assert_eq!(pick_least_ticks_candidate(&sched, Tid(0)), None);
    }
}
